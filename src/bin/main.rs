mod cmd;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "sohost", about = "Runs an Android game library on a Linux host")]
struct Cli {
    /// -v for debug output, -vv for trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the library and run it
    Run(cmd::run::Cmd),
    /// Report what loading the library would need
    Inspect(cmd::inspect::Cmd),
    /// List the host symbol table
    Symbols(cmd::symbols::Cmd),
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match &cli.command {
        Commands::Run(cmd) => cmd.execute(),
        Commands::Inspect(cmd) => cmd.execute(),
        Commands::Symbols(cmd) => cmd.execute(),
    };

    if let Err(err) = result {
        log::error!("{err}");
        eprintln!("sohost: {err}");
        std::process::exit(1);
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use sohost::Result;
use sohost::loader::Loader;

use super::headless_table;

#[derive(Args)]
pub struct Cmd {
    #[arg(short, long)]
    pub library: PathBuf,
}

impl Cmd {
    pub fn execute(&self) -> Result<()> {
        let loader = Loader::new(Arc::new(headless_table()?));
        let report = loader.inspect(&self.library)?;

        println!("{}", self.library.display());
        println!(
            "  machine {} ({}-bit)",
            report.machine,
            if report.is_64 { 64 } else { 32 }
        );
        for segment in &report.segments {
            println!(
                "  LOAD vaddr {:#010x} memsz {:#08x} filesz {:#08x} {:?}",
                segment.vaddr, segment.memsz, segment.filesz, segment.flags
            );
        }
        println!("  {} exports, {} imports, {} relocations", report.exports, report.imports.len(), report.relocations);
        if report.missing.is_empty() {
            println!("  every strong import resolves");
        } else {
            println!("  {} imports the host table does not provide:", report.missing.len());
            for name in &report.missing {
                println!("    {name}");
            }
        }
        Ok(())
    }
}

use clap::Args;
use sohost::Result;

use super::headless_table;

#[derive(Args)]
pub struct Cmd {
    /// Only list names bound to constant-return stubs
    #[arg(long)]
    pub stubs_only: bool,
}

impl Cmd {
    pub fn execute(&self) -> Result<()> {
        let table = headless_table()?;
        if self.stubs_only {
            for (entry, kind) in table.stubs() {
                println!("{:<40} {}", entry.name, kind);
            }
            return Ok(());
        }
        for entry in table.iter() {
            println!(
                "{:<40} {:#018x} {:<8} {:?}",
                entry.name,
                entry.address,
                format!("{:?}", entry.kind),
                entry.origin
            );
        }
        println!("{} symbols", table.len());
        Ok(())
    }
}

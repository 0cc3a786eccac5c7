pub mod inspect;
pub mod run;
pub mod symbols;

use sohost::host::{HeadlessGraphics, NullAudio};
use sohost::{Result, SymbolTable};

/// The table a headless run links against.
fn headless_table() -> Result<SymbolTable> {
    Ok(SymbolTable::with_defaults(&[&HeadlessGraphics, &NullAudio])?)
}

fn parse_address(value: &str) -> std::result::Result<usize, String> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"));
    match digits {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    }
    .map_err(|err| format!("invalid address `{value}`: {err}"))
}

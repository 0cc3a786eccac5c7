pub mod abi;
pub mod bridge;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod host;
pub mod loader;
pub mod symbols;
pub mod types;

pub use config::Config;
pub use context::Context;
pub use error::{Error, Result};
pub use loader::{LoadedImage, Loader};
pub use symbols::SymbolTable;

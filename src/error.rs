use thiserror::Error as ThisError;

use crate::config::ConfigError;
use crate::loader;
use crate::symbols::TableError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] loader::Error),

    #[error("symbol table: {0}")]
    Table(#[from] TableError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start the image thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("image thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;

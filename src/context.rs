use std::sync::Arc;

use crate::abi::PathRewriter;
use crate::bridge::Bridge;
use crate::config::Config;
use crate::host::{Audio, Graphics};
use crate::symbols::{SymbolTable, defaults};

/// Process-wide state shared by the loader, the ABI callbacks and the
/// driver. Built once before the image is loaded and never changed.
pub struct Context {
    pub paths: PathRewriter,
    pub table: Arc<SymbolTable>,
    pub graphics: Arc<dyn Graphics>,
    pub bridge: Arc<Bridge>,
    pub thread_stack_size: usize,
}

impl Context {
    /// Validates `config` and builds the symbol table from the defaults plus
    /// both collaborators.
    pub fn new(config: &Config, graphics: Arc<dyn Graphics>, audio: &dyn Audio) -> crate::Result<Self> {
        config.validate()?;
        let paths = config.path_rewriter()?;
        let mut builder = SymbolTable::builder();
        builder
            .extend(defaults::entries())?
            .extend(graphics.symbols())?
            .extend(audio.symbols())?;
        Ok(Self {
            paths,
            table: Arc::new(builder.build()),
            graphics,
            bridge: Arc::new(Bridge::new(config.sample_rate)),
            thread_stack_size: config.thread_stack_size,
        })
    }
}

use std::path::PathBuf;

use thiserror::Error as ThisError;

use crate::abi::PathRewriter;
use crate::loader::arena::page_size;

/// Stack forced onto every thread the image creates.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 512 * 1024;
pub const DEFAULT_WORKER_STACK_SIZE: usize = 2 * 1024 * 1024;
pub const DEFAULT_DATA_ROOT: &str = "/data/valiant";
pub const DEFAULT_NATIVE_PREFIX: &str = "/";
pub const LIBRARY_NAME: &str = "libuaf.so";

const MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("data root `{data_root}` must be absolute and start with the native prefix `{native_prefix}`")]
    DataRootOutsidePrefix { data_root: String, native_prefix: String },

    #[error("sample rate must be positive, got {0}")]
    SampleRate(i32),

    #[error("screen size {width}x{height} is invalid")]
    Screen { width: i32, height: i32 },

    #[error("dpi must be positive, got {0}")]
    Dpi(i32),

    #[error("{what} stack of {size} bytes is below the {min} byte minimum", min = MIN_STACK_SIZE)]
    StackTooSmall { what: &'static str, size: usize },

    #[error("load base {0:#x} is not page aligned")]
    UnalignedBase(usize),

    #[error("{field} contains a NUL byte")]
    InteriorNul { field: &'static str },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Image to load. Defaults to `libuaf.so` under the data root.
    pub library: Option<PathBuf>,
    pub data_root: String,
    pub native_prefix: String,
    pub load_base: Option<usize>,
    pub sample_rate: i32,
    pub screen: (i32, i32),
    pub dpi: i32,
    pub thread_stack_size: usize,
    pub worker_stack_size: usize,
    /// Skips the resume hook, which selects the high quality renderer.
    pub low_end: bool,
    pub frame_limit: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: None,
            data_root: DEFAULT_DATA_ROOT.to_string(),
            native_prefix: DEFAULT_NATIVE_PREFIX.to_string(),
            load_base: None,
            sample_rate: 32000,
            screen: (960, 544),
            dpi: 220,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
            worker_stack_size: DEFAULT_WORKER_STACK_SIZE,
            low_end: false,
            frame_limit: None,
        }
    }
}

impl Config {
    pub fn library_path(&self) -> PathBuf {
        self.library
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.data_root).join(LIBRARY_NAME))
    }

    pub fn path_rewriter(&self) -> Result<PathRewriter> {
        PathRewriter::new(self.native_prefix.as_str(), self.data_root.as_str()).ok_or_else(|| {
            ConfigError::DataRootOutsidePrefix {
                data_root: self.data_root.clone(),
                native_prefix: self.native_prefix.clone(),
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_root.contains('\0') {
            return Err(ConfigError::InteriorNul { field: "data_root" });
        }
        self.path_rewriter()?;
        if self.sample_rate <= 0 {
            return Err(ConfigError::SampleRate(self.sample_rate));
        }
        let (width, height) = self.screen;
        if width <= 0 || height <= 0 {
            return Err(ConfigError::Screen { width, height });
        }
        if self.dpi <= 0 {
            return Err(ConfigError::Dpi(self.dpi));
        }
        for (what, size) in [
            ("image thread", self.thread_stack_size),
            ("worker thread", self.worker_stack_size),
        ] {
            if size < MIN_STACK_SIZE {
                return Err(ConfigError::StackTooSmall { what, size });
            }
        }
        if let Some(base) = self.load_base {
            if base % page_size() != 0 {
                return Err(ConfigError::UnalignedBase(base));
            }
        }
        Ok(())
    }
}

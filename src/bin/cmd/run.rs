use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use log::info;
use sohost::config::{self, Config};
use sohost::driver::Driver;
use sohost::driver::locale::Language;
use sohost::host::{Graphics, HeadlessGraphics, HeadlessPlatform, NullAudio};
use sohost::loader::{Loader, patch};
use sohost::{Context, Result};

use super::parse_address;

#[derive(Args)]
pub struct Cmd {
    /// Library to load, `libuaf.so` under the data root by default
    #[arg(short, long)]
    pub library: Option<PathBuf>,

    #[arg(long, default_value = config::DEFAULT_DATA_ROOT)]
    pub data_root: String,

    #[arg(long, default_value = config::DEFAULT_NATIVE_PREFIX)]
    pub native_prefix: String,

    /// Map the library at this address, e.g. 0x40000000
    #[arg(long, value_parser = parse_address)]
    pub load_base: Option<usize>,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,

    #[arg(long, default_value_t = 32000)]
    pub sample_rate: i32,

    /// Skip the resume hook
    #[arg(long)]
    pub low_end: bool,

    /// POSIX locale to pick the game language from instead of LANG
    #[arg(long)]
    pub locale: Option<String>,
}

impl Cmd {
    fn config(&self) -> Config {
        Config {
            library: self.library.clone(),
            data_root: self.data_root.clone(),
            native_prefix: self.native_prefix.clone(),
            load_base: self.load_base,
            sample_rate: self.sample_rate,
            low_end: self.low_end,
            frame_limit: self.frames,
            ..Config::default()
        }
    }

    pub fn execute(&self) -> Result<()> {
        let config = self.config();
        let graphics: Arc<dyn Graphics> = Arc::new(HeadlessGraphics);
        let context = Arc::new(Context::new(&config, graphics, &NullAudio)?);
        info!("{} host symbols", context.table.len());

        let loader = Loader::new(Arc::clone(&context.table))
            .with_base(config.load_base)
            .with_patches(patch::default_patches());
        let image = loader.load(&config.library_path())?;
        info!("image mapped at {:#x} ({:#x} bytes)", image.base(), image.size());

        let platform = match &self.locale {
            Some(locale) => HeadlessPlatform::with_language(Language::from_posix(locale)),
            None => HeadlessPlatform::new(),
        };
        let frames = Driver::new(config, context, Arc::new(image), platform).run()?;
        info!("ran {frames} frames");
        Ok(())
    }
}

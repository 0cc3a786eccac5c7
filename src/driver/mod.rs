//! Execution driver: calls the image's entry points in order, then runs
//! the frame loop on a dedicated thread.

pub mod locale;
pub mod touch;

use std::ffi::{CString, c_char, c_int, c_void};
use std::path::Path;
use std::ptr;
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};

use crate::abi;
use crate::bridge::PadButtons;
use crate::config::{Config, ConfigError};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::host::Platform;
use crate::loader::{self, LoadedImage};
use touch::TouchTracker;

const JNI_PREFIX: &str = "Java_com_ubisoft_uaf_UAFJNILib_";

type Env = *mut c_void;
type Obj = *mut c_void;

pub type OnLoadFn = unsafe extern "C" fn(vm: *mut c_void, reserved: *mut c_void) -> c_int;
pub type EnvFn = unsafe extern "C" fn(env: Env) -> c_int;
pub type NativeFn = unsafe extern "C" fn(env: Env, obj: Obj) -> c_int;
pub type InitNativeEngineFn = unsafe extern "C" fn(
    env: Env,
    obj: Obj,
    obb_dir: *const c_char,
    apk_dir: *const c_char,
    obb_path: *const c_char,
    asset_manager: *mut c_void,
) -> c_int;
pub type InitFn = unsafe extern "C" fn(
    env: Env,
    obj: Obj,
    width: c_int,
    height: c_int,
    locale: *const c_char,
    dpi: c_int,
    is_ggtv: u8,
    is_amazon: u8,
    is_portrait: u8,
    version: c_int,
    is_full: u8,
) -> c_int;
pub type SetConnectedFn = unsafe extern "C" fn(env: Env, obj: Obj, connected: c_int) -> c_int;

#[cfg(target_arch = "arm")]
pub type TouchFn =
    unsafe extern "aapcs" fn(Env, Obj, f32, f32, f32, f32, c_int, c_int, c_int) -> c_int;
#[cfg(not(target_arch = "arm"))]
pub type TouchFn = unsafe extern "C" fn(Env, Obj, f32, f32, f32, f32, c_int, c_int, c_int) -> c_int;

#[cfg(target_arch = "arm")]
pub type PadAxisFn = unsafe extern "aapcs" fn(Env, Obj, c_int, f32, f32) -> c_int;
#[cfg(not(target_arch = "arm"))]
pub type PadAxisFn = unsafe extern "C" fn(Env, Obj, c_int, f32, f32) -> c_int;

/// Looks up an export and reinterprets it as a function pointer.
macro_rules! entry {
    ($image:expr, $name:expr) => {
        $image
            .symbol(&$name)
            .map(|address| unsafe { std::mem::transmute::<usize, _>(address) })
    };
}

fn required<F>(found: Option<F>, name: String) -> loader::Result<F> {
    found.ok_or(loader::Error::MissingEntry { name })
}

/// The image's documented entry points.
pub struct EntryPoints {
    pub on_load: OnLoadFn,
    pub init_global: EnvFn,
    pub init_native_engine: InitNativeEngineFn,
    pub init: InitFn,
    pub step: NativeFn,
    pub resume: Option<EnvFn>,
    pub touch: Option<TouchFn>,
    pub set_gamepad_connected: Option<SetConnectedFn>,
    pub set_pad_axis_values: Option<PadAxisFn>,
    pub set_device_back_pressed: Option<NativeFn>,
}

impl EntryPoints {
    pub fn resolve(image: &LoadedImage) -> loader::Result<Self> {
        let jni = |method: &str| format!("{JNI_PREFIX}{method}");
        Ok(Self {
            on_load: required(entry!(image, "JNI_OnLoad"), "JNI_OnLoad".into())?,
            init_global: required(entry!(image, jni("InitGlobal")), jni("InitGlobal"))?,
            init_native_engine: required(entry!(image, jni("initNativeEngine")), jni("initNativeEngine"))?,
            init: required(entry!(image, jni("init")), jni("init"))?,
            step: required(entry!(image, jni("step")), jni("step"))?,
            resume: entry!(image, jni("resume")),
            touch: entry!(image, jni("touch")),
            set_gamepad_connected: entry!(image, jni("setGamePadConnected")),
            set_pad_axis_values: entry!(image, jni("nativeSetPadAxisValues")),
            set_device_back_pressed: entry!(image, jni("setDeviceBackPressed")),
        })
    }
}

fn c_string(value: impl Into<Vec<u8>>, field: &'static str) -> Result<CString> {
    CString::new(value).map_err(|_| Error::Config(ConfigError::InteriorNul { field }))
}

pub struct Driver<P> {
    config: Config,
    context: Arc<Context>,
    image: Arc<LoadedImage>,
    platform: P,
    touches: TouchTracker,
}

impl<P: Platform + 'static> Driver<P> {
    /// Makes `context` visible to the ABI callbacks before any image code
    /// can run.
    pub fn new(config: Config, context: Arc<Context>, image: Arc<LoadedImage>, platform: P) -> Self {
        if !abi::install(Arc::clone(&context)) {
            warn!("ABI context was already installed, keeping the first one");
        }
        Self {
            config,
            context,
            image,
            platform,
            touches: TouchTracker::new(),
        }
    }

    /// Runs the image on a worker thread with the configured stack and
    /// waits for it. Returns the number of frames run.
    pub fn run(self) -> Result<u64> {
        let worker = thread::Builder::new()
            .name("image".into())
            .stack_size(self.config.worker_stack_size)
            .spawn(move || self.run_on_current_thread())
            .map_err(Error::Spawn)?;
        worker.join().map_err(|_| Error::WorkerPanicked)?
    }

    pub fn run_on_current_thread(mut self) -> Result<u64> {
        let entries = EntryPoints::resolve(&self.image)?;
        let data_root = self.context.paths.data_root().to_string();
        let files = Path::new(&data_root).join("Files");
        if let Err(err) = std::fs::create_dir_all(&files) {
            warn!("cannot create {}: {err}", files.display());
        }

        let root = c_string(data_root.as_str(), "data_root")?;
        let obb = c_string(format!("{data_root}/main.obb"), "data_root")?;
        let locale = c_string(self.platform.language().tag(), "locale")?;
        let bridge = Arc::clone(&self.context.bridge);
        let env = bridge.env_handle();
        let obj = ptr::null_mut();
        let (width, height) = self.config.screen;

        unsafe {
            self.image.initialize();

            info!("JNI_OnLoad");
            let version = (entries.on_load)(bridge.vm_handle(), ptr::null_mut());
            debug!("JNI_OnLoad returned {version:#x}");

            info!("InitGlobal");
            (entries.init_global)(env);

            info!("initNativeEngine");
            // the asset manager is an opaque token, see AAssetManager_fromJava
            (entries.init_native_engine)(env, obj, root.as_ptr(), root.as_ptr(), obb.as_ptr(), 1 as *mut c_void);

            info!("init ({}x{}, {:?})", width, height, locale);
            (entries.init)(env, obj, width, height, locale.as_ptr(), self.config.dpi, 0, 0, 0, 0, 1);

            match entries.resume {
                Some(resume) if !self.config.low_end => {
                    info!("resume");
                    resume(env);
                }
                Some(_) => debug!("low-end mode, resume skipped"),
                None => warn!("image exports no resume hook"),
            }

            if let Some(set_connected) = entries.set_gamepad_connected {
                set_connected(env, obj, 1);
            }
        }

        info!("entering frame loop");
        let mut frames = 0;
        while self.config.frame_limit.is_none_or(|limit| frames < limit) {
            self.frame(&entries, env);
            frames += 1;
        }
        info!("frame loop stopped after {frames} frames");
        Ok(frames)
    }

    fn frame(&mut self, entries: &EntryPoints, env: Env) {
        let obj = ptr::null_mut();

        let contacts = self.platform.poll_touch();
        let events = self.touches.update(&contacts, self.platform.touch_scale());
        if let Some(touch) = entries.touch {
            for event in events {
                let (x, y) = (event.x as f32, event.y as f32);
                unsafe { touch(env, obj, x, y, x, y, 0, event.slot as c_int, event.action as c_int) };
            }
        }

        let pad = self.platform.poll_pad();
        self.context.bridge.set_pad(pad);
        if pad.buttons.contains(PadButtons::START) {
            if let Some(back) = entries.set_device_back_pressed {
                unsafe { back(env, obj) };
            }
        }

        unsafe { (entries.step)(env, obj) };
        self.context.graphics.swap_buffers();
    }
}

//! Managed-runtime bridge: the fake `JavaVM` and `JNIEnv` the image is
//! handed.
//!
//! Both handles point at a block whose first word holds the address of the
//! block itself, followed by the rest of the function table. The env block
//! carries the bridge state after its table so callbacks reach it through
//! the `env` argument they are given.

pub mod env;
pub mod method;
pub mod pad;
pub mod vm;

use std::ffi::{c_int, c_void};
use std::ptr::{self, NonNull};
use std::sync::Mutex;
use std::sync::atomic::{AtomicPtr, Ordering};

use env::NativeInterface;
use pad::PadSample;
use vm::InvokeInterface;

pub use method::MethodId;
pub use pad::PadButtons;

/// State the bridge callbacks answer from.
pub struct BridgeState {
    sample_rate: c_int,
    pad: Mutex<PadSample>,
    vm: AtomicPtr<VmBlock>,
}

impl BridgeState {
    pub fn new(sample_rate: c_int) -> Self {
        Self {
            sample_rate,
            pad: Mutex::new(PadSample::default()),
            vm: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn sample_rate(&self) -> c_int {
        self.sample_rate
    }

    /// Most recent controller sample.
    pub fn pad(&self) -> PadSample {
        *self.pad.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_pad(&self, sample: PadSample) {
        *self.pad.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = sample;
    }

    pub fn vm_handle(&self) -> *mut c_void {
        self.vm.load(Ordering::Acquire).cast()
    }
}

#[repr(C)]
pub struct EnvBlock {
    table: NativeInterface,
    state: BridgeState,
}

#[repr(C)]
pub struct VmBlock {
    table: InvokeInterface,
    env: *mut EnvBlock,
}

/// Owner of both blocks. The handles stay valid for as long as this value
/// lives.
pub struct Bridge {
    env: NonNull<EnvBlock>,
    vm: NonNull<VmBlock>,
}

// The blocks are only mutated through the pad mutex after construction.
unsafe impl Send for Bridge {}
unsafe impl Sync for Bridge {}

impl Bridge {
    pub fn new(sample_rate: c_int) -> Self {
        let env = Box::into_raw(Box::new(EnvBlock {
            table: NativeInterface::new(),
            state: BridgeState::new(sample_rate),
        }));
        let vm = Box::into_raw(Box::new(VmBlock {
            table: InvokeInterface::new(),
            env,
        }));
        unsafe {
            (*env).table.self_ptr = env as usize;
            (*vm).table.self_ptr = vm as usize;
            (*env).state.vm.store(vm, Ordering::Release);
            Self {
                env: NonNull::new_unchecked(env),
                vm: NonNull::new_unchecked(vm),
            }
        }
    }

    /// The `JNIEnv*` handed to every entry point.
    pub fn env_handle(&self) -> *mut c_void {
        self.env.as_ptr().cast()
    }

    /// The `JavaVM*` handed to `JNI_OnLoad`.
    pub fn vm_handle(&self) -> *mut c_void {
        self.vm.as_ptr().cast()
    }

    pub fn state(&self) -> &BridgeState {
        unsafe { &self.env.as_ref().state }
    }

    pub fn set_pad(&self, sample: PadSample) {
        self.state().set_pad(sample);
    }

    pub fn pad(&self) -> PadSample {
        self.state().pad()
    }

    pub fn sample_rate(&self) -> c_int {
        self.state().sample_rate()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        unsafe {
            drop(Box::from_raw(self.vm.as_ptr()));
            drop(Box::from_raw(self.env.as_ptr()));
        }
    }
}

/// Env handle of the installed context; null before one is installed.
#[allow(non_snake_case)]
pub extern "C" fn Android_JNI_GetEnv() -> *mut c_void {
    crate::abi::context().map_or(ptr::null_mut(), |ctx| ctx.bridge.env_handle())
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::env::{CLASS_SENTINEL, Env, JObject};
    use super::pad::keycode;
    use super::*;

    fn table(bridge: &Bridge) -> &NativeInterface {
        // the handle dereferences to the table, as compiled JNI code does
        let env = bridge.env_handle() as *const *const NativeInterface;
        unsafe { &**env }
    }

    fn method(bridge: &Bridge, name: &str) -> usize {
        let env = bridge.env_handle() as Env;
        let name = CString::new(name).expect("name");
        unsafe { (table(bridge).get_method_id)(env, ptr::null_mut(), name.as_ptr(), c"()Z".as_ptr()) }
    }

    #[test]
    fn handles_start_with_a_self_reference() {
        let bridge = Bridge::new(32000);
        unsafe {
            assert_eq!(*(bridge.env_handle() as *const usize), bridge.env_handle() as usize);
            assert_eq!(*(bridge.vm_handle() as *const usize), bridge.vm_handle() as usize);
        }
    }

    #[test]
    fn lookups_return_stable_non_null_handles() {
        let bridge = Bridge::new(32000);
        let env = bridge.env_handle() as Env;
        let class = unsafe { (table(&bridge).find_class)(env, c"com/ubisoft/uaf/UAFJNILib".as_ptr()) };
        assert_eq!(class as usize, CLASS_SENTINEL);
        assert_eq!(method(&bridge, "hasWindowFocus"), method(&bridge, "hasWindowFocus"));
        assert_ne!(method(&bridge, "somethingElse"), 0);
    }

    #[test]
    fn known_methods_dispatch_to_their_values() {
        let bridge = Bridge::new(44100);
        let env = bridge.env_handle() as Env;
        let table = table(&bridge);
        let obj: JObject = ptr::null_mut();
        unsafe {
            let rate = method(&bridge, "getNativeOutputSampleRate");
            assert_eq!((table.call_static_int_method_v)(env, obj, rate, ptr::null_mut()), 44100);
            assert_eq!((table.call_int_method_v)(env, obj, rate, ptr::null_mut()), 44100);

            let connected = method(&bridge, "isGamePadConnected");
            assert_eq!((table.call_boolean_method_v)(env, obj, connected, ptr::null_mut()), 1);
            let focus = method(&bridge, "hasWindowFocus");
            assert_eq!((table.call_boolean_method_v)(env, obj, focus, ptr::null_mut()), 1);

            let unknown = method(&bridge, "getBatteryLevel");
            assert_eq!((table.call_int_method_v)(env, obj, unknown, ptr::null_mut()), 0);
            assert_eq!((table.call_boolean_method_v)(env, obj, unknown, ptr::null_mut()), 0);
        }
    }

    #[test]
    fn key_queries_read_the_latest_pad_sample() {
        let bridge = Bridge::new(32000);
        let pressed = |code| {
            env::boolean_result(bridge.state(), MethodId::IsGamepadKeyPressed, || code)
        };
        assert!(!pressed(keycode::BUTTON_A));

        bridge.set_pad(PadSample {
            buttons: PadButtons::CROSS,
            ..Default::default()
        });
        assert!(pressed(keycode::BUTTON_A));

        bridge.set_pad(PadSample::default());
        assert!(!pressed(keycode::BUTTON_A));
    }

    #[test]
    fn vm_hands_out_the_env_block() {
        let bridge = Bridge::new(32000);
        let vm = bridge.vm_handle() as *const *const InvokeInterface;
        let mut out: *mut c_void = ptr::null_mut();
        unsafe {
            let table = &**vm;
            assert_eq!((table.get_env)(bridge.vm_handle().cast(), &mut out, 0x0001_0006), vm::JNI_OK);
            assert_eq!(out, bridge.env_handle());

            out = ptr::null_mut();
            let attach = (table.attach_current_thread)(bridge.vm_handle().cast(), &mut out, ptr::null_mut());
            assert_eq!(attach, vm::JNI_OK);
            assert_eq!(out, bridge.env_handle());
        }
    }

    #[test]
    fn env_reports_its_vm() {
        let bridge = Bridge::new(32000);
        let mut out: *mut c_void = ptr::null_mut();
        let status = unsafe { (table(&bridge).get_java_vm)(bridge.env_handle().cast(), &mut out) };
        assert_eq!(status, 0);
        assert_eq!(out, bridge.vm_handle());
    }
}

//! The `JNIInvokeInterface` table behind the VM handle.

use std::ffi::{c_int, c_void};
use std::mem::{offset_of, size_of};

use log::debug;
use static_assertions::const_assert_eq;

use super::VmBlock;
use super::env::unimplemented_slot;

pub type Vm = *mut VmBlock;

pub const INVOKE_INTERFACE_SLOTS: usize = 8;

pub const JNI_OK: c_int = 0;
pub const JNI_ERR: c_int = -1;

type AttachFn = unsafe extern "C" fn(Vm, *mut *mut c_void, *mut c_void) -> c_int;

#[repr(C)]
pub struct InvokeInterface {
    pub self_ptr: usize,
    reserved: [usize; 2],
    pub destroy_java_vm: unsafe extern "C" fn(Vm) -> c_int,
    pub attach_current_thread: AttachFn,
    pub detach_current_thread: unsafe extern "C" fn(Vm) -> c_int,
    pub get_env: unsafe extern "C" fn(Vm, *mut *mut c_void, c_int) -> c_int,
    pub attach_current_thread_as_daemon: AttachFn,
}

const_assert_eq!(offset_of!(InvokeInterface, attach_current_thread), 4 * size_of::<usize>());
const_assert_eq!(offset_of!(InvokeInterface, detach_current_thread), 5 * size_of::<usize>());
const_assert_eq!(offset_of!(InvokeInterface, get_env), 6 * size_of::<usize>());
const_assert_eq!(size_of::<InvokeInterface>(), INVOKE_INTERFACE_SLOTS * size_of::<usize>());

impl InvokeInterface {
    pub fn new() -> Self {
        let filler = unimplemented_slot as *const () as usize;
        Self {
            self_ptr: 0,
            reserved: [filler; 2],
            destroy_java_vm,
            attach_current_thread: attach,
            detach_current_thread,
            get_env,
            attach_current_thread_as_daemon: attach,
        }
    }
}

impl Default for InvokeInterface {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out the process's env block.
unsafe fn write_env(vm: Vm, out: *mut *mut c_void) -> c_int {
    let (Some(block), Some(out)) = (unsafe { vm.as_ref() }, unsafe { out.as_mut() }) else {
        return JNI_ERR;
    };
    *out = block.env.cast();
    JNI_OK
}

unsafe extern "C" fn destroy_java_vm(_vm: Vm) -> c_int {
    debug!("DestroyJavaVM ignored");
    JNI_OK
}

unsafe extern "C" fn attach(vm: Vm, env: *mut *mut c_void, _args: *mut c_void) -> c_int {
    unsafe { write_env(vm, env) }
}

unsafe extern "C" fn detach_current_thread(_vm: Vm) -> c_int {
    JNI_OK
}

unsafe extern "C" fn get_env(vm: Vm, env: *mut *mut c_void, _version: c_int) -> c_int {
    unsafe { write_env(vm, env) }
}

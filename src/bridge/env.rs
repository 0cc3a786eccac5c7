//! The `JNINativeInterface` function table and the callbacks behind it.
//!
//! The table is laid out slot for slot like the real one. Slots the image
//! is known to call get a typed field; every other slot holds
//! [`unimplemented_slot`], so no offset into the table is a crash site.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::mem::{offset_of, size_of};

use log::{trace, warn};
use static_assertions::const_assert_eq;

use super::method::MethodId;
use super::{BridgeState, EnvBlock};
use crate::abi::softfp;
use crate::abi::valist::{RawVaList, VaArgs};

pub type Env = *mut EnvBlock;
pub type JObject = *mut c_void;
pub type JMethod = usize;
pub type JField = usize;
pub type JBoolean = u8;

pub const NATIVE_INTERFACE_SLOTS: usize = 233;

pub const CLASS_SENTINEL: usize = 0x4141_4141;
pub const GLOBAL_REF_SENTINEL: usize = 0x4242_4242;
pub const NEW_OBJECT_SENTINEL: usize = 0x4343_4343;
pub const OBJECT_CLASS_SENTINEL: usize = 0x4444_4444;
pub const OBJECT_RESULT_SENTINEL: usize = 0x3434_3434;
pub const FIELD_SENTINEL: usize = 0x4646_4646;

#[cfg(target_arch = "arm")]
pub type FloatFieldFn = unsafe extern "aapcs" fn(Env, JObject, JField) -> f32;
#[cfg(not(target_arch = "arm"))]
pub type FloatFieldFn = unsafe extern "C" fn(Env, JObject, JField) -> f32;

#[cfg(target_arch = "arm")]
pub type FloatCallFn = unsafe extern "aapcs" fn(Env, JObject, JMethod, RawVaList) -> f32;
#[cfg(not(target_arch = "arm"))]
pub type FloatCallFn = unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> f32;

type LookupFn = unsafe extern "C" fn(Env, JObject, *const c_char, *const c_char) -> usize;

#[repr(C)]
pub struct NativeInterface {
    /// Word 0 holds the table's own address, so the env pointer can be
    /// dereferenced once to reach the table.
    pub self_ptr: usize,
    gap_1: [usize; 5],
    pub find_class: unsafe extern "C" fn(Env, *const c_char) -> JObject,
    gap_7: [usize; 12],
    pub push_local_frame: unsafe extern "C" fn(Env, c_int) -> c_int,
    pub pop_local_frame: unsafe extern "C" fn(Env, JObject) -> JObject,
    pub new_global_ref: unsafe extern "C" fn(Env, JObject) -> JObject,
    pub delete_global_ref: unsafe extern "C" fn(Env, JObject),
    pub delete_local_ref: unsafe extern "C" fn(Env, JObject),
    gap_24: [usize; 5],
    pub new_object_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> JObject,
    gap_30: [usize; 1],
    pub get_object_class: unsafe extern "C" fn(Env, JObject) -> JObject,
    gap_32: [usize; 1],
    pub get_method_id: LookupFn,
    gap_34: [usize; 1],
    pub call_object_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> JObject,
    gap_36: [usize; 2],
    pub call_boolean_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> JBoolean,
    gap_39: [usize; 11],
    pub call_int_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> c_int,
    gap_51: [usize; 2],
    pub call_long_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> i64,
    gap_54: [usize; 8],
    pub call_void_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList),
    gap_63: [usize; 31],
    pub get_field_id: LookupFn,
    pub get_boolean_field: unsafe extern "C" fn(Env, JObject, JField) -> JBoolean,
    gap_96: [usize; 4],
    pub get_int_field: unsafe extern "C" fn(Env, JObject, JField) -> c_int,
    gap_101: [usize; 1],
    pub get_float_field: FloatFieldFn,
    gap_103: [usize; 10],
    pub get_static_method_id: LookupFn,
    gap_114: [usize; 1],
    pub call_static_object_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> JObject,
    gap_116: [usize; 2],
    pub call_static_boolean_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> JBoolean,
    gap_119: [usize; 11],
    pub call_static_int_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> c_int,
    gap_131: [usize; 4],
    pub call_static_long_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList) -> i64,
    pub call_static_float_method_v: FloatCallFn,
    gap_137: [usize; 5],
    pub call_static_void_method_v: unsafe extern "C" fn(Env, JObject, JMethod, RawVaList),
    gap_143: [usize; 1],
    pub get_static_field_id: LookupFn,
    pub get_static_object_field: unsafe extern "C" fn(Env, JObject, JField) -> JObject,
    gap_146: [usize; 21],
    pub new_string_utf: unsafe extern "C" fn(Env, *const c_char) -> JObject,
    pub get_string_utf_length: unsafe extern "C" fn(Env, JObject) -> c_int,
    pub get_string_utf_chars: unsafe extern "C" fn(Env, JObject, *mut JBoolean) -> *const c_char,
    pub release_string_utf_chars: unsafe extern "C" fn(Env, JObject, *const c_char),
    pub get_array_length: unsafe extern "C" fn(Env, JObject) -> c_int,
    gap_172: [usize; 1],
    pub get_object_array_element: unsafe extern "C" fn(Env, JObject, c_int) -> JObject,
    gap_174: [usize; 41],
    pub register_natives: unsafe extern "C" fn(Env, JObject, *const c_void, c_int) -> c_int,
    gap_216: [usize; 3],
    pub get_java_vm: unsafe extern "C" fn(Env, *mut *mut c_void) -> c_int,
    gap_220: [usize; 1],
    pub get_string_utf_region: unsafe extern "C" fn(Env, JObject, c_int, c_int, *mut c_char),
    gap_222: [usize; 11],
}

macro_rules! check_slots {
    ($($field:ident = $slot:expr),* $(,)?) => {
        $(const_assert_eq!(offset_of!(NativeInterface, $field), $slot * size_of::<usize>());)*
    };
}

check_slots! {
    find_class = 6,
    push_local_frame = 19,
    pop_local_frame = 20,
    new_global_ref = 21,
    delete_global_ref = 22,
    delete_local_ref = 23,
    new_object_v = 29,
    get_object_class = 31,
    get_method_id = 33,
    call_object_method_v = 35,
    call_boolean_method_v = 38,
    call_int_method_v = 50,
    call_long_method_v = 53,
    call_void_method_v = 62,
    get_field_id = 94,
    get_boolean_field = 95,
    get_int_field = 100,
    get_float_field = 102,
    get_static_method_id = 113,
    call_static_object_method_v = 115,
    call_static_boolean_method_v = 118,
    call_static_int_method_v = 130,
    call_static_long_method_v = 135,
    call_static_float_method_v = 136,
    call_static_void_method_v = 142,
    get_static_field_id = 144,
    get_static_object_field = 145,
    new_string_utf = 167,
    get_string_utf_length = 168,
    get_string_utf_chars = 169,
    release_string_utf_chars = 170,
    get_array_length = 171,
    get_object_array_element = 173,
    register_natives = 215,
    get_java_vm = 219,
    get_string_utf_region = 221,
}

const_assert_eq!(size_of::<NativeInterface>(), NATIVE_INTERFACE_SLOTS * size_of::<usize>());

/// Fills every slot without a real implementation.
pub extern "C" fn unimplemented_slot() -> usize {
    warn!("image called an unimplemented JNI function");
    0
}

impl NativeInterface {
    pub fn new() -> Self {
        let filler = unimplemented_slot as *const () as usize;
        Self {
            self_ptr: 0,
            gap_1: [filler; 5],
            find_class,
            gap_7: [filler; 12],
            push_local_frame,
            pop_local_frame,
            new_global_ref,
            delete_global_ref,
            delete_local_ref,
            gap_24: [filler; 5],
            new_object_v,
            gap_30: [filler; 1],
            get_object_class,
            gap_32: [filler; 1],
            get_method_id,
            gap_34: [filler; 1],
            call_object_method_v,
            gap_36: [filler; 2],
            call_boolean_method_v,
            gap_39: [filler; 11],
            call_int_method_v,
            gap_51: [filler; 2],
            call_long_method_v,
            gap_54: [filler; 8],
            call_void_method_v,
            gap_63: [filler; 31],
            get_field_id,
            get_boolean_field,
            gap_96: [filler; 4],
            get_int_field,
            gap_101: [filler; 1],
            get_float_field,
            gap_103: [filler; 10],
            get_static_method_id: get_method_id,
            gap_114: [filler; 1],
            call_static_object_method_v,
            gap_116: [filler; 2],
            call_static_boolean_method_v,
            gap_119: [filler; 11],
            call_static_int_method_v: call_int_method_v,
            gap_131: [filler; 4],
            call_static_long_method_v,
            call_static_float_method_v,
            gap_137: [filler; 5],
            call_static_void_method_v: call_void_method_v,
            gap_143: [filler; 1],
            get_static_field_id: get_field_id,
            get_static_object_field,
            gap_146: [filler; 21],
            new_string_utf,
            get_string_utf_length,
            get_string_utf_chars,
            release_string_utf_chars,
            get_array_length,
            gap_172: [filler; 1],
            get_object_array_element,
            gap_174: [filler; 41],
            register_natives,
            gap_216: [filler; 3],
            get_java_vm,
            gap_220: [filler; 1],
            get_string_utf_region,
            gap_222: [filler; 11],
        }
    }

    /// Address stored in slot `index`.
    pub fn slot(&self, index: usize) -> Option<usize> {
        if index >= NATIVE_INTERFACE_SLOTS {
            return None;
        }
        let words = self as *const Self as *const usize;
        Some(unsafe { *words.add(index) })
    }
}

impl Default for NativeInterface {
    fn default() -> Self {
        Self::new()
    }
}

unsafe fn state<'a>(env: Env) -> Option<&'a BridgeState> {
    unsafe { env.as_ref() }.map(|block| &block.state)
}

fn sentinel(value: usize) -> JObject {
    value as JObject
}

unsafe extern "C" fn find_class(_env: Env, name: *const c_char) -> JObject {
    if !name.is_null() {
        trace!("FindClass({:?})", unsafe { CStr::from_ptr(name) });
    }
    sentinel(CLASS_SENTINEL)
}

unsafe extern "C" fn push_local_frame(_env: Env, _capacity: c_int) -> c_int {
    0
}

unsafe extern "C" fn pop_local_frame(_env: Env, result: JObject) -> JObject {
    result
}

unsafe extern "C" fn new_global_ref(_env: Env, _obj: JObject) -> JObject {
    sentinel(GLOBAL_REF_SENTINEL)
}

unsafe extern "C" fn delete_global_ref(_env: Env, _obj: JObject) {}

unsafe extern "C" fn delete_local_ref(_env: Env, _obj: JObject) {}

unsafe extern "C" fn new_object_v(_env: Env, _class: JObject, _method: JMethod, _args: RawVaList) -> JObject {
    sentinel(NEW_OBJECT_SENTINEL)
}

unsafe extern "C" fn get_object_class(_env: Env, _obj: JObject) -> JObject {
    sentinel(OBJECT_CLASS_SENTINEL)
}

unsafe extern "C" fn get_method_id(_env: Env, _class: JObject, name: *const c_char, _sig: *const c_char) -> JMethod {
    if name.is_null() {
        return MethodId::Unknown.handle();
    }
    let name = unsafe { CStr::from_ptr(name) };
    let id = MethodId::from_name(name.to_bytes());
    trace!("GetMethodID({name:?}) -> {id:?}");
    id.handle()
}

unsafe extern "C" fn call_object_method_v(_env: Env, _obj: JObject, _method: JMethod, _args: RawVaList) -> JObject {
    sentinel(OBJECT_RESULT_SENTINEL)
}

/// Behaviour of boolean-returning instance methods.
pub fn boolean_result(state: &BridgeState, method: MethodId, key: impl FnOnce() -> i32) -> bool {
    match method {
        MethodId::HasWindowFocus | MethodId::IsGamepadConnected => true,
        MethodId::IsGamepadKeyPressed => state.pad().is_pressed(key()),
        _ => false,
    }
}

/// Behaviour of int-returning methods, static or not.
pub fn int_result(state: &BridgeState, method: MethodId) -> c_int {
    match method {
        MethodId::GetNativeOutputSampleRate => state.sample_rate(),
        MethodId::GetConnectionType => 0,
        _ => 0,
    }
}

unsafe extern "C" fn call_boolean_method_v(env: Env, _obj: JObject, method: JMethod, args: RawVaList) -> JBoolean {
    let Some(state) = (unsafe { state(env) }) else {
        return 0;
    };
    // isGamePadKeyPressed(int device, int keycode)
    let key = || unsafe { VaArgs::new(args).nth_word(1) as c_int };
    boolean_result(state, MethodId::from_handle(method), key) as JBoolean
}

unsafe extern "C" fn call_int_method_v(env: Env, _obj: JObject, method: JMethod, _args: RawVaList) -> c_int {
    match unsafe { state(env) } {
        Some(state) => int_result(state, MethodId::from_handle(method)),
        None => 0,
    }
}

unsafe extern "C" fn call_long_method_v(_env: Env, _obj: JObject, _method: JMethod, _args: RawVaList) -> i64 {
    -1
}

unsafe extern "C" fn call_void_method_v(_env: Env, _obj: JObject, _method: JMethod, _args: RawVaList) {}

unsafe extern "C" fn get_field_id(_env: Env, _class: JObject, _name: *const c_char, _sig: *const c_char) -> JField {
    FIELD_SENTINEL
}

unsafe extern "C" fn get_boolean_field(_env: Env, _obj: JObject, _field: JField) -> JBoolean {
    1
}

unsafe extern "C" fn get_int_field(_env: Env, _obj: JObject, _field: JField) -> c_int {
    0
}

softfp! {
    pub unsafe fn get_float_field(_env: Env, _obj: JObject, _field: JField) -> f32 {
        0.0
    }

    pub unsafe fn call_static_float_method_v(_env: Env, _class: JObject, method: JMethod, _args: RawVaList) -> f32 {
        let method = MethodId::from_handle(method);
        if method != MethodId::Unknown {
            trace!("CallStaticFloatMethodV({method:?})");
        }
        0.0
    }
}

unsafe extern "C" fn call_static_object_method_v(
    _env: Env,
    _class: JObject,
    _method: JMethod,
    _args: RawVaList,
) -> JObject {
    std::ptr::null_mut()
}

unsafe extern "C" fn call_static_boolean_method_v(
    _env: Env,
    _class: JObject,
    _method: JMethod,
    _args: RawVaList,
) -> JBoolean {
    0
}

unsafe extern "C" fn call_static_long_method_v(_env: Env, _class: JObject, _method: JMethod, _args: RawVaList) -> i64 {
    0
}

unsafe extern "C" fn get_static_object_field(_env: Env, _class: JObject, _field: JField) -> JObject {
    std::ptr::null_mut()
}

/// Java strings are plain C strings on this side of the bridge.
unsafe extern "C" fn new_string_utf(_env: Env, bytes: *const c_char) -> JObject {
    bytes as JObject
}

unsafe extern "C" fn get_string_utf_length(_env: Env, string: JObject) -> c_int {
    if string.is_null() {
        return 0;
    }
    unsafe { CStr::from_ptr(string as *const c_char) }.to_bytes().len() as c_int
}

unsafe extern "C" fn get_string_utf_chars(_env: Env, string: JObject, is_copy: *mut JBoolean) -> *const c_char {
    if let Some(is_copy) = unsafe { is_copy.as_mut() } {
        *is_copy = 0;
    }
    string as *const c_char
}

unsafe extern "C" fn release_string_utf_chars(_env: Env, _string: JObject, _chars: *const c_char) {}

/// Arrays start with their 32-bit length.
unsafe extern "C" fn get_array_length(_env: Env, array: JObject) -> c_int {
    if array.is_null() {
        return 0;
    }
    unsafe { (array as *const i32).read_unaligned() }
}

unsafe extern "C" fn get_object_array_element(_env: Env, _array: JObject, _index: c_int) -> JObject {
    std::ptr::null_mut()
}

unsafe extern "C" fn register_natives(_env: Env, _class: JObject, _methods: *const c_void, count: c_int) -> c_int {
    trace!("RegisterNatives({count} methods) ignored");
    0
}

unsafe extern "C" fn get_java_vm(env: Env, vm: *mut *mut c_void) -> c_int {
    let (Some(state), Some(vm)) = (unsafe { state(env) }, unsafe { vm.as_mut() }) else {
        return -1;
    };
    *vm = state.vm_handle();
    0
}

/// Copies `len` bytes starting at `start` and terminates the copy.
unsafe extern "C" fn get_string_utf_region(_env: Env, string: JObject, start: c_int, len: c_int, buf: *mut c_char) {
    if string.is_null() || buf.is_null() || start < 0 || len < 0 {
        return;
    }
    unsafe {
        let src = (string as *const c_char).add(start as usize);
        std::ptr::copy_nonoverlapping(src, buf, len as usize);
        *buf.add(len as usize) = 0;
    }
}

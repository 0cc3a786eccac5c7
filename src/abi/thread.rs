//! Thread creation and thread attributes.
//!
//! `pthread_t` is a word on both sides and is written straight into the
//! image's variable. Attribute objects live on the host heap behind the
//! image's handle word, as in [`super::sync`].

use libc::{c_int, c_void, pthread_attr_t, pthread_t, sched_param, size_t};
use log::{debug, warn};

use crate::config::DEFAULT_THREAD_STACK_SIZE;

#[allow(clashing_extern_declarations)]
unsafe extern "C" {
    #[link_name = "pthread_attr_setschedparam"]
    fn host_attr_setschedparam(attr: *mut pthread_attr_t, param: *const sched_param) -> c_int;
    #[link_name = "pthread_attr_getschedparam"]
    fn host_attr_getschedparam(attr: *const pthread_attr_t, param: *mut sched_param) -> c_int;
    #[link_name = "pthread_attr_getdetachstate"]
    fn host_attr_getdetachstate(attr: *const pthread_attr_t, state: *mut c_int) -> c_int;
    #[link_name = "pthread_attr_setstack"]
    fn host_attr_setstack(attr: *mut pthread_attr_t, addr: *mut c_void, size: size_t) -> c_int;
    #[link_name = "pthread_attr_getstack"]
    fn host_attr_getstack(attr: *const pthread_attr_t, addr: *mut *mut c_void, size: *mut size_t) -> c_int;
}

pub type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;

fn forced_stack_size() -> usize {
    super::context()
        .map(|ctx| ctx.thread_stack_size)
        .unwrap_or(DEFAULT_THREAD_STACK_SIZE)
}

unsafe fn boxed(attr: *const c_void) -> *mut pthread_attr_t {
    if attr.is_null() {
        return std::ptr::null_mut();
    }
    unsafe { *(attr as *const *mut pthread_attr_t) }
}

/// Creates a host thread, ignoring any stack size the image asked for.
/// The image's attribute object keeps its own stack size.
pub unsafe extern "C" fn pthread_create(
    thread: *mut pthread_t,
    attr: *const c_void,
    start: StartRoutine,
    arg: *mut c_void,
) -> c_int {
    let stack_size = forced_stack_size();
    unsafe {
        let requested = boxed(attr);
        let rc = if requested.is_null() {
            let mut local: pthread_attr_t = std::mem::zeroed();
            let rc = libc::pthread_attr_init(&mut local);
            if rc != 0 {
                return rc;
            }
            let rc = match libc::pthread_attr_setstacksize(&mut local, stack_size) {
                0 => libc::pthread_create(thread, &local, start, arg),
                rc => rc,
            };
            libc::pthread_attr_destroy(&mut local);
            rc
        } else {
            let mut original: size_t = 0;
            let rc = libc::pthread_attr_getstacksize(requested, &mut original);
            if rc != 0 {
                return rc;
            }
            let rc = libc::pthread_attr_setstacksize(requested, stack_size);
            if rc != 0 {
                return rc;
            }
            let rc = libc::pthread_create(thread, requested, start, arg);
            let restored = libc::pthread_attr_setstacksize(requested, original);
            if restored != 0 {
                warn!("could not restore the image's thread stack size: {restored}");
            }
            rc
        };
        if rc == 0 {
            debug!("image thread {:#x} started with {} KiB stack", *thread as usize, stack_size / 1024);
        }
        rc
    }
}

pub unsafe extern "C" fn pthread_attr_init(attr: *mut c_void) -> c_int {
    unsafe {
        let host = Box::into_raw(Box::new(std::mem::zeroed::<pthread_attr_t>()));
        *(attr as *mut *mut pthread_attr_t) = host;
        libc::pthread_attr_init(host)
    }
}

pub unsafe extern "C" fn pthread_attr_destroy(attr: *mut c_void) -> c_int {
    unsafe {
        let host = boxed(attr);
        if host.is_null() {
            return libc::EINVAL;
        }
        let rc = libc::pthread_attr_destroy(host);
        drop(Box::from_raw(host));
        *(attr as *mut usize) = 0;
        rc
    }
}

pub unsafe extern "C" fn pthread_attr_setdetachstate(attr: *mut c_void, state: c_int) -> c_int {
    unsafe { libc::pthread_attr_setdetachstate(boxed(attr), state) }
}

pub unsafe extern "C" fn pthread_attr_getdetachstate(attr: *const c_void, state: *mut c_int) -> c_int {
    unsafe { host_attr_getdetachstate(boxed(attr), state) }
}

pub unsafe extern "C" fn pthread_attr_setstacksize(attr: *mut c_void, size: size_t) -> c_int {
    unsafe { libc::pthread_attr_setstacksize(boxed(attr), size) }
}

pub unsafe extern "C" fn pthread_attr_getstacksize(attr: *const c_void, size: *mut size_t) -> c_int {
    unsafe { libc::pthread_attr_getstacksize(boxed(attr), size) }
}

pub unsafe extern "C" fn pthread_attr_setstack(attr: *mut c_void, addr: *mut c_void, size: size_t) -> c_int {
    unsafe { host_attr_setstack(boxed(attr), addr, size) }
}

pub unsafe extern "C" fn pthread_attr_getstack(
    attr: *const c_void,
    addr: *mut *mut c_void,
    size: *mut size_t,
) -> c_int {
    unsafe { host_attr_getstack(boxed(attr), addr, size) }
}

pub unsafe extern "C" fn pthread_attr_setschedparam(attr: *mut c_void, param: *const sched_param) -> c_int {
    unsafe { host_attr_setschedparam(boxed(attr), param) }
}

pub unsafe extern "C" fn pthread_attr_getschedparam(attr: *const c_void, param: *mut sched_param) -> c_int {
    unsafe { host_attr_getschedparam(boxed(attr), param) }
}

/// Fills a fresh boxed attribute object describing `thread`.
pub unsafe extern "C" fn pthread_getattr_np(thread: pthread_t, attr: *mut c_void) -> c_int {
    unsafe {
        let host = Box::into_raw(Box::new(std::mem::zeroed::<pthread_attr_t>()));
        let rc = libc::pthread_getattr_np(thread, host);
        if rc != 0 {
            drop(Box::from_raw(host));
            return rc;
        }
        *(attr as *mut *mut pthread_attr_t) = host;
        0
    }
}

//! Counting semaphores behind the image's `sem_t` handle word.

use std::sync::{Condvar, Mutex};
use std::time::Instant;

use libc::{c_int, c_uint, c_void, timespec};

use super::set_errno;
use super::time::until_realtime;

#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<u32>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(value: u32) -> Self {
        Self {
            count: Mutex::new(value),
            available: Condvar::new(),
        }
    }

    /// Returns false, leaving the count alone, if it would overflow.
    pub fn post(&self) -> bool {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        let Some(next) = count.checked_add(1) else {
            return false;
        };
        *count = next;
        self.available.notify_one();
        true
    }

    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count == 0 {
            count = self.available.wait(count).unwrap_or_else(|e| e.into_inner());
        }
        *count -= 1;
    }

    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Waits until `deadline` on the host monotonic clock.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .available
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            count = guard;
        }
        *count -= 1;
        true
    }

    pub fn value(&self) -> u32 {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

unsafe fn semaphore<'a>(sem: *mut c_void) -> Option<&'a Semaphore> {
    if sem.is_null() {
        return None;
    }
    unsafe { (*(sem as *const *const Semaphore)).as_ref() }
}

pub unsafe extern "C" fn sem_init(sem: *mut c_void, _pshared: c_int, value: c_uint) -> c_int {
    if sem.is_null() {
        set_errno(libc::EINVAL);
        return -1;
    }
    let boxed = Box::into_raw(Box::new(Semaphore::new(value)));
    unsafe { *(sem as *mut *mut Semaphore) = boxed };
    0
}

pub unsafe extern "C" fn sem_destroy(sem: *mut c_void) -> c_int {
    if sem.is_null() {
        set_errno(libc::EINVAL);
        return -1;
    }
    unsafe {
        let slot = sem as *mut *mut Semaphore;
        let boxed = *slot;
        if boxed.is_null() {
            set_errno(libc::EINVAL);
            return -1;
        }
        *slot = std::ptr::null_mut();
        drop(Box::from_raw(boxed));
    }
    0
}

pub unsafe extern "C" fn sem_post(sem: *mut c_void) -> c_int {
    match unsafe { semaphore(sem) } {
        Some(sem) if sem.post() => 0,
        Some(_) => {
            set_errno(libc::EOVERFLOW);
            -1
        }
        None => {
            set_errno(libc::EINVAL);
            -1
        }
    }
}

pub unsafe extern "C" fn sem_wait(sem: *mut c_void) -> c_int {
    match unsafe { semaphore(sem) } {
        Some(sem) => {
            sem.wait();
            0
        }
        None => {
            set_errno(libc::EINVAL);
            -1
        }
    }
}

pub unsafe extern "C" fn sem_trywait(sem: *mut c_void) -> c_int {
    match unsafe { semaphore(sem) } {
        Some(sem) if sem.try_wait() => 0,
        Some(_) => {
            set_errno(libc::EAGAIN);
            -1
        }
        None => {
            set_errno(libc::EINVAL);
            -1
        }
    }
}

/// `abstime` is an absolute `CLOCK_REALTIME` deadline. It is turned into a
/// monotonic deadline once, on entry, and only that is waited on.
pub unsafe extern "C" fn sem_timedwait(sem: *mut c_void, abstime: *const timespec) -> c_int {
    let Some(sem) = (unsafe { semaphore(sem) }) else {
        set_errno(libc::EINVAL);
        return -1;
    };
    let Some(abstime) = (unsafe { abstime.as_ref() }) else {
        set_errno(libc::EINVAL);
        return -1;
    };
    if !(0..1_000_000_000).contains(&(abstime.tv_nsec as i64)) {
        set_errno(libc::EINVAL);
        return -1;
    }
    let deadline = Instant::now() + until_realtime(abstime);
    if sem.wait_until(deadline) {
        0
    } else {
        set_errno(libc::ETIMEDOUT);
        -1
    }
}

pub unsafe extern "C" fn sem_getvalue(sem: *mut c_void, value: *mut c_int) -> c_int {
    match unsafe { semaphore(sem) } {
        Some(sem) if !value.is_null() => {
            unsafe { *value = sem.value().min(c_int::MAX as u32) as c_int };
            0
        }
        _ => {
            set_errno(libc::EINVAL);
            -1
        }
    }
}

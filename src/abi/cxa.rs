//! C++ runtime support: one-time initialisation guards and the stack
//! protector.

use std::sync::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};

use libc::c_int;
use log::error;

const INITIALIZED: usize = 0;
const PENDING: usize = 1;

/// Serialises every guard in the process. Contention is limited to the
/// first use of each function-local static.
static GUARDS: Mutex<()> = Mutex::new(());
static RELEASED: Condvar = Condvar::new();

unsafe fn byte<'a>(guard: *mut u8, index: usize) -> &'a AtomicU8 {
    unsafe { AtomicU8::from_ptr(guard.add(index)) }
}

/// Returns 1 when the caller must run the initialiser, 0 when another
/// thread already has.
pub unsafe extern "C" fn __cxa_guard_acquire(guard: *mut u8) -> c_int {
    let (done, pending) = unsafe { (byte(guard, INITIALIZED), byte(guard, PENDING)) };
    if done.load(Ordering::Acquire) != 0 {
        return 0;
    }
    let mut lock = GUARDS.lock().unwrap_or_else(|e| e.into_inner());
    loop {
        if done.load(Ordering::Acquire) != 0 {
            return 0;
        }
        if pending.load(Ordering::Relaxed) == 0 {
            pending.store(1, Ordering::Relaxed);
            return 1;
        }
        lock = RELEASED.wait(lock).unwrap_or_else(|e| e.into_inner());
    }
}

pub unsafe extern "C" fn __cxa_guard_release(guard: *mut u8) {
    let _lock = GUARDS.lock().unwrap_or_else(|e| e.into_inner());
    unsafe {
        byte(guard, PENDING).store(0, Ordering::Relaxed);
        byte(guard, INITIALIZED).store(1, Ordering::Release);
    }
    RELEASED.notify_all();
}

/// The initialiser threw; the next acquirer retries it.
pub unsafe extern "C" fn __cxa_guard_abort(guard: *mut u8) {
    let _lock = GUARDS.lock().unwrap_or_else(|e| e.into_inner());
    unsafe { byte(guard, PENDING).store(0, Ordering::Relaxed) };
    RELEASED.notify_all();
}

pub extern "C" fn __cxa_call_unexpected(_exception: *mut libc::c_void) {
    error!("unexpected exception escaped a noexcept function in the image");
    std::process::abort();
}

#[repr(transparent)]
pub struct StackGuard(usize);

/// Canary word compared by the image's stack-protector epilogues.
pub static STACK_CHK_GUARD: StackGuard = StackGuard(0x4242_4242);

pub extern "C" fn __stack_chk_fail() {
    error!("stack smashing detected in the image");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn guard_runs_the_initialiser_once() {
        let mut guard = [0u8; 8];
        unsafe {
            assert_eq!(__cxa_guard_acquire(guard.as_mut_ptr()), 1);
            __cxa_guard_release(guard.as_mut_ptr());
            assert_eq!(__cxa_guard_acquire(guard.as_mut_ptr()), 0);
        }
        assert_eq!(guard[0], 1);
    }

    #[test]
    fn aborted_guard_can_be_retried() {
        let mut guard = [0u8; 8];
        unsafe {
            assert_eq!(__cxa_guard_acquire(guard.as_mut_ptr()), 1);
            __cxa_guard_abort(guard.as_mut_ptr());
            assert_eq!(__cxa_guard_acquire(guard.as_mut_ptr()), 1);
            __cxa_guard_release(guard.as_mut_ptr());
        }
    }

    #[test]
    fn concurrent_acquirers_see_a_single_winner() {
        let guard = Arc::new([const { AtomicU8::new(0) }; 8]);
        let runs = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || unsafe {
                    let raw = guard.as_ptr() as *mut u8;
                    if __cxa_guard_acquire(raw) == 1 {
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        runs.fetch_add(1, Ordering::SeqCst);
                        __cxa_guard_release(raw);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn canary_has_the_fixed_value() {
        assert_eq!(STACK_CHK_GUARD.0, 0x4242_4242);
    }
}

//! Mutexes, condition variables and their attribute objects.
//!
//! The image's `pthread_mutex_t`/`pthread_cond_t`/attribute storage is
//! treated as one handle word. Initialised objects store a pointer to a
//! heap-allocated host object there. Statically initialised ones still
//! hold the foreign initializer value and are constructed on first use;
//! construction races are settled by a compare-exchange on the word.

use std::sync::atomic::{AtomicUsize, Ordering};

use libc::{
    c_int, pthread_cond_t, pthread_condattr_t, pthread_mutex_t, pthread_mutexattr_t, timespec,
};
use log::trace;

/// Values of the foreign static mutex initializers.
pub const MUTEX_STATIC_NORMAL: usize = 0x0000;
pub const MUTEX_STATIC_RECURSIVE: usize = 0x4000;
pub const MUTEX_STATIC_ERRORCHECK: usize = 0x8000;

fn handle<'a>(word: *mut libc::c_void) -> &'a AtomicUsize {
    // The image's object is at least one word and word aligned.
    unsafe { &*(word as *const AtomicUsize) }
}

fn mutex_type_for(sentinel: usize) -> Option<c_int> {
    match sentinel {
        MUTEX_STATIC_NORMAL => Some(libc::PTHREAD_MUTEX_NORMAL),
        MUTEX_STATIC_RECURSIVE => Some(libc::PTHREAD_MUTEX_RECURSIVE),
        MUTEX_STATIC_ERRORCHECK => Some(libc::PTHREAD_MUTEX_ERRORCHECK),
        _ => None,
    }
}

unsafe fn new_mutex(kind: c_int) -> *mut pthread_mutex_t {
    unsafe {
        let mut attr: pthread_mutexattr_t = std::mem::zeroed();
        libc::pthread_mutexattr_init(&mut attr);
        libc::pthread_mutexattr_settype(&mut attr, kind);
        let mutex = Box::into_raw(Box::new(std::mem::zeroed::<pthread_mutex_t>()));
        libc::pthread_mutex_init(mutex, &attr);
        libc::pthread_mutexattr_destroy(&mut attr);
        mutex
    }
}

unsafe fn free_mutex(mutex: *mut pthread_mutex_t) {
    unsafe {
        libc::pthread_mutex_destroy(mutex);
        drop(Box::from_raw(mutex));
    }
}

/// Returns the host mutex behind `word`, constructing it when the word
/// still holds a static initializer.
pub(crate) unsafe fn resolve_mutex(word: *mut libc::c_void) -> *mut pthread_mutex_t {
    let slot = handle(word);
    let current = slot.load(Ordering::Acquire);
    let Some(kind) = mutex_type_for(current) else {
        return current as *mut pthread_mutex_t;
    };

    let fresh = unsafe { new_mutex(kind) };
    match slot.compare_exchange(current, fresh as usize, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            trace!("constructed static mutex {:p}", word);
            fresh
        }
        Err(winner) => {
            unsafe { free_mutex(fresh) };
            winner as *mut pthread_mutex_t
        }
    }
}

unsafe fn resolve_cond(word: *mut libc::c_void) -> *mut pthread_cond_t {
    let slot = handle(word);
    let current = slot.load(Ordering::Acquire);
    if current != 0 {
        return current as *mut pthread_cond_t;
    }

    let fresh = Box::into_raw(Box::new(unsafe { std::mem::zeroed::<pthread_cond_t>() }));
    unsafe { libc::pthread_cond_init(fresh, std::ptr::null()) };
    match slot.compare_exchange(0, fresh as usize, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => fresh,
        Err(winner) => {
            unsafe {
                libc::pthread_cond_destroy(fresh);
                drop(Box::from_raw(fresh));
            }
            winner as *mut pthread_cond_t
        }
    }
}

/// Host attribute object stored behind an attribute handle, or null.
unsafe fn boxed<T>(word: *const libc::c_void) -> *mut T {
    if word.is_null() {
        return std::ptr::null_mut();
    }
    unsafe { *(word as *const *mut T) }
}

pub unsafe extern "C" fn pthread_mutex_init(
    mutex: *mut libc::c_void,
    attr: *const libc::c_void,
) -> c_int {
    unsafe {
        let host = Box::into_raw(Box::new(std::mem::zeroed::<pthread_mutex_t>()));
        let rc = libc::pthread_mutex_init(host, boxed::<pthread_mutexattr_t>(attr));
        if rc != 0 {
            drop(Box::from_raw(host));
            return rc;
        }
        handle(mutex).store(host as usize, Ordering::Release);
        0
    }
}

pub unsafe extern "C" fn pthread_mutex_destroy(mutex: *mut libc::c_void) -> c_int {
    let current = handle(mutex).swap(MUTEX_STATIC_NORMAL, Ordering::AcqRel);
    if mutex_type_for(current).is_some() {
        return 0;
    }
    unsafe { free_mutex(current as *mut pthread_mutex_t) };
    0
}

pub unsafe extern "C" fn pthread_mutex_lock(mutex: *mut libc::c_void) -> c_int {
    unsafe { libc::pthread_mutex_lock(resolve_mutex(mutex)) }
}

pub unsafe extern "C" fn pthread_mutex_trylock(mutex: *mut libc::c_void) -> c_int {
    unsafe { libc::pthread_mutex_trylock(resolve_mutex(mutex)) }
}

pub unsafe extern "C" fn pthread_mutex_unlock(mutex: *mut libc::c_void) -> c_int {
    unsafe { libc::pthread_mutex_unlock(resolve_mutex(mutex)) }
}

pub unsafe extern "C" fn pthread_mutexattr_init(attr: *mut libc::c_void) -> c_int {
    unsafe {
        let host = Box::into_raw(Box::new(std::mem::zeroed::<pthread_mutexattr_t>()));
        *(attr as *mut *mut pthread_mutexattr_t) = host;
        libc::pthread_mutexattr_init(host)
    }
}

pub unsafe extern "C" fn pthread_mutexattr_destroy(attr: *mut libc::c_void) -> c_int {
    unsafe {
        let host = boxed::<pthread_mutexattr_t>(attr);
        if host.is_null() {
            return libc::EINVAL;
        }
        let rc = libc::pthread_mutexattr_destroy(host);
        drop(Box::from_raw(host));
        *(attr as *mut usize) = 0;
        rc
    }
}

pub unsafe extern "C" fn pthread_mutexattr_settype(attr: *mut libc::c_void, kind: c_int) -> c_int {
    unsafe { libc::pthread_mutexattr_settype(boxed(attr), kind) }
}

pub unsafe extern "C" fn pthread_mutexattr_setpshared(attr: *mut libc::c_void, pshared: c_int) -> c_int {
    unsafe { libc::pthread_mutexattr_setpshared(boxed(attr), pshared) }
}

pub unsafe extern "C" fn pthread_cond_init(cond: *mut libc::c_void, attr: *const libc::c_void) -> c_int {
    unsafe {
        let host = Box::into_raw(Box::new(std::mem::zeroed::<pthread_cond_t>()));
        let rc = libc::pthread_cond_init(host, boxed::<pthread_condattr_t>(attr));
        if rc != 0 {
            drop(Box::from_raw(host));
            return rc;
        }
        handle(cond).store(host as usize, Ordering::Release);
        0
    }
}

pub unsafe extern "C" fn pthread_cond_destroy(cond: *mut libc::c_void) -> c_int {
    let current = handle(cond).swap(0, Ordering::AcqRel);
    if current == 0 {
        return 0;
    }
    unsafe {
        let host = current as *mut pthread_cond_t;
        let rc = libc::pthread_cond_destroy(host);
        drop(Box::from_raw(host));
        rc
    }
}

pub unsafe extern "C" fn pthread_cond_signal(cond: *mut libc::c_void) -> c_int {
    unsafe { libc::pthread_cond_signal(resolve_cond(cond)) }
}

pub unsafe extern "C" fn pthread_cond_broadcast(cond: *mut libc::c_void) -> c_int {
    unsafe { libc::pthread_cond_broadcast(resolve_cond(cond)) }
}

pub unsafe extern "C" fn pthread_cond_wait(cond: *mut libc::c_void, mutex: *mut libc::c_void) -> c_int {
    unsafe { libc::pthread_cond_wait(resolve_cond(cond), resolve_mutex(mutex)) }
}

/// `abstime` is on `CLOCK_REALTIME`, which is also the host default for
/// condition variables, so it is passed through unchanged.
pub unsafe extern "C" fn pthread_cond_timedwait(
    cond: *mut libc::c_void,
    mutex: *mut libc::c_void,
    abstime: *const timespec,
) -> c_int {
    unsafe { libc::pthread_cond_timedwait(resolve_cond(cond), resolve_mutex(mutex), abstime) }
}

pub unsafe extern "C" fn pthread_condattr_init(attr: *mut libc::c_void) -> c_int {
    unsafe {
        let host = Box::into_raw(Box::new(std::mem::zeroed::<pthread_condattr_t>()));
        *(attr as *mut *mut pthread_condattr_t) = host;
        libc::pthread_condattr_init(host)
    }
}

pub unsafe extern "C" fn pthread_condattr_destroy(attr: *mut libc::c_void) -> c_int {
    unsafe {
        let host = boxed::<pthread_condattr_t>(attr);
        if host.is_null() {
            return libc::EINVAL;
        }
        let rc = libc::pthread_condattr_destroy(host);
        drop(Box::from_raw(host));
        *(attr as *mut usize) = 0;
        rc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    /// Foreign mutex storage as a zero-initialised static would leave it.
    struct ForeignMutex(AtomicUsize);

    impl ForeignMutex {
        fn new(sentinel: usize) -> Self {
            Self(AtomicUsize::new(sentinel))
        }

        fn ptr(&self) -> *mut libc::c_void {
            &self.0 as *const AtomicUsize as *mut libc::c_void
        }
    }

    #[test]
    fn static_mutex_is_constructed_once_under_contention() {
        let mutex = Arc::new(ForeignMutex::new(MUTEX_STATIC_NORMAL));
        let counter = Arc::new(AtomicU32::new(0));
        let threads: Vec<_> = (0..2)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        unsafe {
                            assert_eq!(pthread_mutex_lock(mutex.ptr()), 0);
                            // non-atomic read-modify-write under the lock
                            let v = counter.load(Ordering::Relaxed);
                            counter.store(v + 1, Ordering::Relaxed);
                            assert_eq!(pthread_mutex_unlock(mutex.ptr()), 0);
                        }
                    }
                    mutex.0.load(Ordering::Acquire)
                })
            })
            .collect();

        let seen: Vec<usize> = threads.into_iter().map(|t| t.join().expect("thread")).collect();
        assert_eq!(counter.load(Ordering::Relaxed), 2000);
        assert_eq!(seen[0], seen[1], "both threads used the same host mutex");
        assert!(mutex_type_for(seen[0]).is_none());
        unsafe { pthread_mutex_destroy(mutex.ptr()) };
    }

    #[test]
    fn static_recursive_mutex_allows_relocking() {
        let mutex = ForeignMutex::new(MUTEX_STATIC_RECURSIVE);
        unsafe {
            assert_eq!(pthread_mutex_lock(mutex.ptr()), 0);
            assert_eq!(pthread_mutex_trylock(mutex.ptr()), 0);
            assert_eq!(pthread_mutex_unlock(mutex.ptr()), 0);
            assert_eq!(pthread_mutex_unlock(mutex.ptr()), 0);
            pthread_mutex_destroy(mutex.ptr());
        }
    }

    #[test]
    fn static_errorcheck_mutex_reports_relock() {
        let mutex = ForeignMutex::new(MUTEX_STATIC_ERRORCHECK);
        unsafe {
            assert_eq!(pthread_mutex_lock(mutex.ptr()), 0);
            assert_eq!(pthread_mutex_lock(mutex.ptr()), libc::EDEADLK);
            assert_eq!(pthread_mutex_unlock(mutex.ptr()), 0);
            pthread_mutex_destroy(mutex.ptr());
        }
    }

    #[test]
    fn explicit_init_uses_boxed_attributes() {
        let attr = ForeignMutex::new(0);
        let mutex = ForeignMutex::new(0);
        unsafe {
            assert_eq!(pthread_mutexattr_init(attr.ptr()), 0);
            assert_eq!(pthread_mutexattr_settype(attr.ptr(), libc::PTHREAD_MUTEX_RECURSIVE), 0);
            assert_eq!(pthread_mutex_init(mutex.ptr(), attr.ptr()), 0);
            assert_eq!(pthread_mutexattr_destroy(attr.ptr()), 0);

            assert_eq!(pthread_mutex_lock(mutex.ptr()), 0);
            assert_eq!(pthread_mutex_lock(mutex.ptr()), 0);
            pthread_mutex_unlock(mutex.ptr());
            pthread_mutex_unlock(mutex.ptr());
            pthread_mutex_destroy(mutex.ptr());
        }
        assert_eq!(mutex.0.load(Ordering::Relaxed), MUTEX_STATIC_NORMAL);
    }

    #[test]
    fn static_condvar_wakes_waiter() {
        let mutex = Arc::new(ForeignMutex::new(MUTEX_STATIC_NORMAL));
        let cond = Arc::new(ForeignMutex::new(0));
        let ready = Arc::new(AtomicU32::new(0));

        let waiter = {
            let (mutex, cond, ready) = (Arc::clone(&mutex), Arc::clone(&cond), Arc::clone(&ready));
            thread::spawn(move || unsafe {
                pthread_mutex_lock(mutex.ptr());
                while ready.load(Ordering::Relaxed) == 0 {
                    pthread_cond_wait(cond.ptr(), mutex.ptr());
                }
                pthread_mutex_unlock(mutex.ptr());
            })
        };

        unsafe {
            pthread_mutex_lock(mutex.ptr());
            ready.store(1, Ordering::Relaxed);
            pthread_cond_broadcast(cond.ptr());
            pthread_mutex_unlock(mutex.ptr());
        }
        waiter.join().expect("waiter");
        unsafe {
            pthread_cond_destroy(cond.ptr());
            pthread_mutex_destroy(mutex.ptr());
        }
    }
}

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use libc::{c_int, timespec, timeval};

use super::set_errno;

static MONOTONIC_EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Microseconds on the realtime clock.
pub fn realtime_micros() -> i64 {
    let mut now = timeval { tv_sec: 0, tv_usec: 0 };
    unsafe { libc::gettimeofday(&mut now, std::ptr::null_mut()) };
    now.tv_sec as i64 * 1_000_000 + now.tv_usec as i64
}

/// Microseconds since the first clock query of the process.
pub fn monotonic_micros() -> i64 {
    MONOTONIC_EPOCH.elapsed().as_micros() as i64
}

/// Nanosecond clock synthesised from a microsecond source; the lowest
/// three digits of `tv_nsec` are always zero.
pub unsafe extern "C" fn clock_gettime(clock: c_int, tp: *mut timespec) -> c_int {
    if tp.is_null() {
        set_errno(libc::EFAULT);
        return -1;
    }
    let micros = match clock {
        libc::CLOCK_REALTIME | libc::CLOCK_REALTIME_COARSE => realtime_micros(),
        libc::CLOCK_MONOTONIC
        | libc::CLOCK_MONOTONIC_RAW
        | libc::CLOCK_MONOTONIC_COARSE
        | libc::CLOCK_BOOTTIME => monotonic_micros(),
        // per-thread and per-process CPU clocks
        _ => {
            let mut host = timespec { tv_sec: 0, tv_nsec: 0 };
            let rc = unsafe { libc::clock_gettime(clock, &mut host) };
            if rc != 0 {
                return rc;
            }
            host.tv_sec as i64 * 1_000_000 + host.tv_nsec as i64 / 1000
        }
    };
    unsafe {
        (*tp).tv_sec = (micros / 1_000_000) as _;
        (*tp).tv_nsec = ((micros % 1_000_000) * 1000) as _;
    }
    0
}

pub unsafe extern "C" fn gettimeofday(tv: *mut timeval, _tz: *mut libc::c_void) -> c_int {
    if tv.is_null() {
        return 0;
    }
    let micros = realtime_micros();
    unsafe {
        (*tv).tv_sec = (micros / 1_000_000) as _;
        (*tv).tv_usec = (micros % 1_000_000) as _;
    }
    0
}

pub unsafe extern "C" fn nanosleep(req: *const timespec, rem: *mut timespec) -> c_int {
    if req.is_null() {
        set_errno(libc::EFAULT);
        return -1;
    }
    let req = unsafe { *req };
    if req.tv_sec < 0 || !(0..1_000_000_000).contains(&(req.tv_nsec as i64)) {
        set_errno(libc::EINVAL);
        return -1;
    }
    std::thread::sleep(Duration::new(req.tv_sec as u64, req.tv_nsec as u32));
    if !rem.is_null() {
        unsafe { *rem = timespec { tv_sec: 0, tv_nsec: 0 } };
    }
    0
}

pub extern "C" fn usleep(usec: libc::c_uint) -> c_int {
    std::thread::sleep(Duration::from_micros(usec as u64));
    0
}

/// Converts an absolute `CLOCK_REALTIME` deadline into the time left from
/// now, clamped at zero.
pub fn until_realtime(deadline: &timespec) -> Duration {
    let deadline_us = deadline.tv_sec as i64 * 1_000_000 + deadline.tv_nsec as i64 / 1000;
    let left = deadline_us - realtime_micros();
    Duration::from_micros(left.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanoseconds_are_whole_microseconds() {
        let mut ts = timespec { tv_sec: 0, tv_nsec: 0 };
        let rc = unsafe { clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
        assert_eq!(rc, 0);
        assert!(ts.tv_sec > 1_600_000_000);
        assert_eq!(ts.tv_nsec % 1000, 0);
        assert!(ts.tv_nsec < 1_000_000_000);
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let mut a = timespec { tv_sec: 0, tv_nsec: 0 };
        let mut b = timespec { tv_sec: 0, tv_nsec: 0 };
        unsafe {
            clock_gettime(libc::CLOCK_MONOTONIC, &mut a);
            std::thread::sleep(Duration::from_millis(2));
            clock_gettime(libc::CLOCK_MONOTONIC, &mut b);
        }
        let a_ns = a.tv_sec as i64 * 1_000_000_000 + a.tv_nsec as i64;
        let b_ns = b.tv_sec as i64 * 1_000_000_000 + b.tv_nsec as i64;
        assert!(b_ns - a_ns >= 2_000_000);
    }

    #[test]
    fn past_deadlines_have_nothing_left() {
        let past = timespec { tv_sec: 1, tv_nsec: 0 };
        assert_eq!(until_realtime(&past), Duration::ZERO);
    }

    #[test]
    fn invalid_sleep_is_rejected() {
        let bad = timespec { tv_sec: 0, tv_nsec: 2_000_000_000 };
        assert_eq!(unsafe { nanosleep(&bad, std::ptr::null_mut()) }, -1);
    }
}

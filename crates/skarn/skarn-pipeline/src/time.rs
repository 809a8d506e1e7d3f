//! Monotonic wall-clock helpers.
//!
//! Everything time-based in the monitor (slice decay, range decay, clock
//! matching, the UI rate cap) runs off one monotonic millisecond counter.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(target_os = "macos")]
use std::sync::OnceLock;

/// Returns the current monotonic time in milliseconds.
#[inline]
#[cfg(target_os = "macos")]
#[allow(deprecated)]
pub fn now_ms() -> u64 {
    static TIMEBASE: OnceLock<(u64, u64)> = OnceLock::new();
    let (numer, denom) = *TIMEBASE.get_or_init(|| {
        let mut info = libc::mach_timebase_info_data_t { numer: 0, denom: 0 };
        let rc = unsafe { libc::mach_timebase_info(&mut info) };
        if rc != 0 || info.denom == 0 {
            (1, 1)
        } else {
            (info.numer as u64, info.denom as u64)
        }
    });
    let t = unsafe { libc::mach_absolute_time() } as u128;
    ((t * numer as u128) / (denom as u128) / 1_000_000) as u64
}

/// Returns the current monotonic time in milliseconds.
#[inline]
#[cfg(not(target_os = "macos"))]
pub fn now_ms() -> u64 {
    let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000 + ts.tv_nsec as u64 / 1_000_000
}

/// Time source handed to the event driver; mockable for tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    fn sleep_ms(&self, ms: u64);
}

/// The real thing.
#[derive(Debug, Default)]
pub struct MonoClock;

impl Clock for MonoClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }
}

/// Test clock: time moves only when told to, sleeps advance it.
#[derive(Debug, Default)]
pub struct FakeClock {
    ms: AtomicU64,
    slept: AtomicU64,
}

impl FakeClock {
    pub fn new(start_ms: u64) -> Self {
        FakeClock {
            ms: AtomicU64::new(start_ms),
            slept: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::Relaxed);
    }

    /// Total time spent in `sleep_ms`, for asserting throttle behaviour.
    pub fn slept_ms(&self) -> u64 {
        self.slept.load(Ordering::Relaxed)
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::Relaxed)
    }

    fn sleep_ms(&self, ms: u64) {
        self.ms.fetch_add(ms, Ordering::Relaxed);
        self.slept.fetch_add(ms, Ordering::Relaxed);
    }
}

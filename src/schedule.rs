//! Capture and snapshot cadence.
//!
//! `CadenceState::tick` runs on monotonic milliseconds, so a wall clock step
//! never stalls or bunches captures. The snapshot timer is only consulted on
//! ticks where the capture timer fires, so stills are a sub-cadence of
//! captures rather than an independent timer. A due snapshot stays due until
//! the caller commits it, which happens once a frame has actually reached the
//! still sink.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 400;
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 2400;
/// Upper bound accepted for either interval (one day).
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cadence {
    pub capture_interval_ms: u64,
    pub snapshot_interval_ms: u64,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            capture_interval_ms: DEFAULT_CAPTURE_INTERVAL_MS,
            snapshot_interval_ms: DEFAULT_SNAPSHOT_INTERVAL_MS,
        }
    }
}

/// What a tick decided to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    pub capture: bool,
    pub snapshot: bool,
}

#[derive(Clone, Debug)]
pub struct CadenceState {
    cadence: Cadence,
    last_capture_ms: i64,
    last_snapshot_ms: i64,
}

impl CadenceState {
    pub fn new(cadence: Cadence, start_ms: i64) -> Self {
        Self {
            cadence,
            last_capture_ms: start_ms,
            last_snapshot_ms: start_ms,
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn last_capture_ms(&self) -> i64 {
        self.last_capture_ms
    }

    pub fn last_snapshot_ms(&self) -> i64 {
        self.last_snapshot_ms
    }

    /// Advance the capture timer for monotonic `now_ms`. Both comparisons
    /// are strict.
    ///
    /// `snapshot` reports that a still is due; the snapshot timer only moves
    /// on `commit_snapshot`.
    pub fn tick(&mut self, now_ms: i64) -> Tick {
        if now_ms < self.last_capture_ms {
            // Time went backward: restart the window from here.
            self.last_capture_ms = now_ms;
            self.last_snapshot_ms = self.last_snapshot_ms.min(now_ms);
            return Tick::default();
        }
        if now_ms - self.last_capture_ms <= interval_ms(self.cadence.capture_interval_ms) {
            return Tick::default();
        }
        self.last_capture_ms = now_ms;

        Tick {
            capture: true,
            snapshot: now_ms.saturating_sub(self.last_snapshot_ms)
                > interval_ms(self.cadence.snapshot_interval_ms),
        }
    }

    /// Record that the still for the tick at `now_ms` went to its sink.
    pub fn commit_snapshot(&mut self, now_ms: i64) {
        self.last_snapshot_ms = now_ms;
    }

    /// Time left until the next tick can fire, never more than one interval.
    ///
    /// Firing needs strictly more than the interval, hence the extra millisecond.
    pub fn until_next_capture(&self, now_ms: i64) -> Duration {
        let window = interval_ms(self.cadence.capture_interval_ms).saturating_add(1);
        let due = self.last_capture_ms.saturating_add(window);
        Duration::from_millis(due.saturating_sub(now_ms).clamp(0, window) as u64)
    }
}

fn interval_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Time source for the capture loop.
pub trait Clock: Send + Sync {
    /// Milliseconds since the UNIX epoch. Stamps events and file names.
    fn now_ms(&self) -> i64;

    /// Milliseconds on a clock that never steps backward. Drives the cadence.
    fn monotonic_ms(&self) -> i64;

    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn monotonic_ms(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock: sleeping advances time instead of blocking.
///
/// `set` moves only the wall clock, the way an NTP step would.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
    monotonic_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
            monotonic_ms: AtomicI64::new(0),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let ms = duration.as_millis() as i64;
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
        self.monotonic_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn monotonic_ms(&self) -> i64 {
        self.monotonic_ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of nanosecond timestamps for journal frames.
///
/// Every `gen_time` stamped into a frame comes from a `Clock`, so the choice
/// of implementation decides the ordering guarantees of the merged event
/// sequence. `TscClock` is the default: monotonic within a process, anchored
/// to wall-clock time at startup.
pub trait Clock: Send + Sync {
    /// Current time in nanoseconds since the UNIX epoch.
    fn now(&self) -> u64;
}

/// Wall-clock time via `std::time::SystemTime`.
///
/// Susceptible to NTP adjustments; use only where backward jumps in
/// `gen_time` are tolerable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_nanos() as u64,
            Err(_) => 0,
        }
    }
}

/// TSC-based clock via the `quanta` crate.
///
/// Anchors to wall-clock time once at construction and progresses by TSC
/// ticks, so timestamps never move backwards within a process.
#[derive(Debug, Clone)]
pub struct TscClock {
    clock: quanta::Clock,
    anchor_wall_ns: u64,
    anchor: quanta::Instant,
}

impl Default for TscClock {
    fn default() -> Self {
        let clock = quanta::Clock::new();
        let anchor = clock.now();
        Self {
            clock,
            anchor_wall_ns: SystemClock.now(),
            anchor,
        }
    }
}

impl TscClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for TscClock {
    fn now(&self) -> u64 {
        let delta = self.clock.now().duration_since(self.anchor);
        self.anchor_wall_ns + delta.as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsc_clock_is_monotonic() {
        let clock = TscClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let now = clock.now();
            assert!(now >= prev);
            prev = now;
        }
    }
}

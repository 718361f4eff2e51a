//! Deterministic periodic pacing and cycle statistics.
//!
//! Absolute-deadline sleeping on `CLOCK_MONOTONIC` keeps the period free
//! of drift: each deadline is the previous one plus the period, not "now
//! plus the period". Statistics are O(1) per cycle with no allocation.

use std::time::Duration;

use nix::sys::time::TimeSpec;
use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};
use tracing::warn;

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub cycle_count: u64,
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub sum_cycle_ns: i64,
    pub sum_sq_cycle_ns: i128,
    pub overruns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            sum_sq_cycle_ns: 0,
            overruns: 0,
        }
    }

    /// Record one cycle's body duration.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, overran: bool) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
        self.sum_sq_cycle_ns += (duration_ns as i128) * (duration_ns as i128);
        if overran {
            self.overruns += 1;
        }
    }

    /// Average cycle duration [ns]; 0 before the first cycle.
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 { 0 } else { self.sum_cycle_ns / self.cycle_count as i64 }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

fn now(clock: ClockId) -> TimeSpec {
    clock_gettime(clock).unwrap_or_else(|_| TimeSpec::new(0, 0))
}

fn timespec_to_ns(t: TimeSpec) -> i64 {
    t.tv_sec() * 1_000_000_000 + t.tv_nsec()
}

fn ns_to_timespec(ns: i64) -> TimeSpec {
    TimeSpec::new(ns / 1_000_000_000, ns % 1_000_000_000)
}

/// Run `body` once per `period` until it returns `false`.
///
/// Sleeps with `clock_nanosleep(TIMER_ABSTIME)` to an absolute deadline:
/// each deadline is the previous one plus the period, so the schedule
/// does not drift with body duration or wake-up latency. A missed
/// deadline is recorded as an overrun and the schedule resynchronizes to
/// now rather than bursting to catch up. Statistics accumulate into
/// `stats`.
pub fn run_periodic<F>(period: Duration, stats: &mut CycleStats, mut body: F)
where
    F: FnMut() -> bool,
{
    let clock = ClockId::CLOCK_MONOTONIC;
    let period_ns = period.as_nanos() as i64;
    let mut deadline_ns = timespec_to_ns(now(clock)) + period_ns;

    loop {
        let start_ns = timespec_to_ns(now(clock));
        let more = body();
        let end_ns = timespec_to_ns(now(clock));
        let overran = end_ns > deadline_ns;
        stats.record(end_ns - start_ns, overran);
        if !more {
            break;
        }

        if overran {
            if stats.overruns % 1000 == 0 || stats.overruns == 1 {
                warn!(
                    overruns = stats.overruns,
                    last_cycle_ns = stats.last_cycle_ns,
                    "cycle overrun"
                );
            }
            // Resynchronize instead of bursting.
            deadline_ns = end_ns + period_ns;
            continue;
        }

        let _ = clock_nanosleep(
            clock,
            ClockNanosleepFlags::TIMER_ABSTIME,
            &ns_to_timespec(deadline_ns),
        );
        deadline_ns += period_ns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_track_min_max_avg() {
        let mut s = CycleStats::new();
        s.record(10, false);
        s.record(30, false);
        s.record(20, true);
        assert_eq!(s.cycle_count, 3);
        assert_eq!(s.min_cycle_ns, 10);
        assert_eq!(s.max_cycle_ns, 30);
        assert_eq!(s.avg_cycle_ns(), 20);
        assert_eq!(s.overruns, 1);
    }

    #[test]
    fn run_periodic_counts_cycles() {
        let mut s = CycleStats::new();
        let mut n = 0;
        run_periodic(Duration::from_micros(200), &mut s, || {
            n += 1;
            n < 10
        });
        assert_eq!(n, 10);
        assert_eq!(s.cycle_count, 10);
    }

    #[test]
    fn run_periodic_roughly_paces() {
        let mut s = CycleStats::new();
        let period = Duration::from_millis(2);
        let t0 = std::time::Instant::now();
        let mut n = 0;
        run_periodic(period, &mut s, || {
            n += 1;
            n < 5
        });
        // Four sleeps of ~2 ms each; generous bounds for loaded machines.
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_millis(6), "ran too fast: {elapsed:?}");
    }
}

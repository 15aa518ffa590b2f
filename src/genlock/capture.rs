use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use crate::types::{Micros, Period};

/// A monotonic microsecond time source.
pub trait Clock: Send + Sync {
    /// The current time. Must never go backwards.
    fn now_us(&self) -> Micros;
}

/// A clock counting microseconds since it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> Micros {
        self.start.elapsed().as_micros() as Micros
    }
}

/// The running totals for one measurement window, plus the time of the most recent edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowAccumulator {
    /// Number of valid periods folded in this window.
    pub count: u32,

    /// Sum of valid periods (µs).
    pub sum: u64,

    /// Sum of squared valid periods (µs²), used for the RMS jitter.
    pub sum_sq: u64,

    /// Shortest valid period seen this window.
    pub min: Option<Period>,

    /// Longest valid period seen this window.
    pub max: Option<Period>,

    /// Time of the last edge, valid or not. `None` until the first edge is seen. This
    /// survives window resets.
    pub last_edge: Option<Micros>,
}

impl WindowAccumulator {
    /// Fold in an edge observed at `now`. The edge always becomes the new `last_edge`; the
    /// period it closes is only counted if it is at least `min_valid_period`.
    pub fn record_edge(&mut self, now: Micros, min_valid_period: Period) {
        let prev = self.last_edge.replace(now);

        let Some(prev) = prev else {
            return;
        };

        let period = Period::try_from(now.saturating_sub(prev)).unwrap_or(Period::MAX);
        if period < min_valid_period {
            return;
        }

        let wide = u64::from(period);
        self.count = self.count.saturating_add(1);
        self.sum = self.sum.saturating_add(wide);
        self.sum_sq = self.sum_sq.saturating_add(wide * wide);
        self.min = Some(self.min.map_or(period, |min| min.min(period)));
        self.max = Some(self.max.map_or(period, |max| max.max(period)));
    }

    /// Copy the window totals out and reset them for the next window. `last_edge` is kept.
    fn take_window(&mut self) -> WindowSnapshot {
        let snapshot = WindowSnapshot {
            count: self.count,
            sum: self.sum,
            sum_sq: self.sum_sq,
            min: self.min,
            max: self.max,
            last_edge: self.last_edge,
        };

        *self = Self {
            last_edge: self.last_edge,
            ..Self::default()
        };

        snapshot
    }
}

/// A plain copy of the accumulator, taken once per window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub count: u32,
    pub sum: u64,
    pub sum_sq: u64,
    pub min: Option<Period>,
    pub max: Option<Period>,
    pub last_edge: Option<Micros>,
}

/// The accumulator shared between the edge handler and the foreground loop. Every access goes
/// through [`SharedAccumulator::critical_section`], so neither side can observe a half-updated
/// window.
#[derive(Debug)]
pub struct SharedAccumulator {
    min_valid_period: Period,
    inner: Mutex<WindowAccumulator>,
}

impl SharedAccumulator {
    pub fn new(min_valid_period: Period) -> Self {
        Self {
            min_valid_period,
            inner: Mutex::new(WindowAccumulator::default()),
        }
    }

    /// Run `f` with exclusive access to the accumulator. The lock is released on every exit
    /// path; a panic on the other side does not wedge the capture path.
    pub fn critical_section<R>(&self, f: impl FnOnce(&mut WindowAccumulator) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    /// The edge handler body: record an edge observed at `now`.
    pub fn record_edge(&self, now: Micros) {
        let min_valid_period = self.min_valid_period;
        self.critical_section(|acc| acc.record_edge(now, min_valid_period));
    }

    /// Snapshot and reset the window totals. Only memory copies happen while the lock is held.
    pub fn drain(&self) -> WindowSnapshot {
        self.critical_section(WindowAccumulator::take_window)
    }
}

/// The rising-edge handler. Timestamps each edge with its own clock and folds it into the
/// shared accumulator.
pub struct EdgeCapture<C: Clock> {
    clock: Arc<C>,
    accumulator: Arc<SharedAccumulator>,
}

impl<C: Clock> EdgeCapture<C> {
    pub fn new(clock: Arc<C>, accumulator: Arc<SharedAccumulator>) -> Self {
        Self { clock, accumulator }
    }

    /// Called on every rising edge of the sync line.
    pub fn on_edge(&self) {
        let now = self.clock.now_us();
        self.accumulator.record_edge(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use proptest::prelude::*;

    const MIN_PERIOD: Period = 5000;

    struct FakeClock(AtomicU64);

    impl Clock for FakeClock {
        fn now_us(&self) -> Micros {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn first_edge_only_sets_last_edge() {
        let mut acc = WindowAccumulator::default();
        acc.record_edge(1_000_000, MIN_PERIOD);

        assert_eq!(acc.count, 0);
        assert_eq!(acc.last_edge, Some(1_000_000));
        assert_eq!(acc.min, None);
    }

    #[test]
    fn edge_at_time_zero_is_still_an_edge() {
        let mut acc = WindowAccumulator::default();
        acc.record_edge(0, MIN_PERIOD);
        acc.record_edge(16_667, MIN_PERIOD);

        assert_eq!(acc.count, 1);
        assert_eq!(acc.sum, 16_667);
    }

    #[test]
    fn valid_periods_accumulate() {
        let mut acc = WindowAccumulator::default();
        for t in [0, 16_667, 33_337, 50_004] {
            acc.record_edge(t, MIN_PERIOD);
        }

        assert_eq!(acc.count, 3);
        assert_eq!(acc.sum, 50_004);
        assert_eq!(acc.sum_sq, 16_667 * 16_667 + 16_670 * 16_670 + 16_667 * 16_667);
        assert_eq!(acc.min, Some(16_667));
        assert_eq!(acc.max, Some(16_670));
    }

    #[test]
    fn glitch_is_dropped_but_moves_last_edge() {
        let mut acc = WindowAccumulator::default();
        acc.record_edge(0, MIN_PERIOD);
        acc.record_edge(16_667, MIN_PERIOD);
        acc.record_edge(16_767, MIN_PERIOD);

        assert_eq!(acc.count, 1);
        assert_eq!(acc.last_edge, Some(16_767));

        // The period after a glitch is measured from the glitch, not the last good edge.
        acc.record_edge(33_334, MIN_PERIOD);
        assert_eq!(acc.count, 2);
        assert_eq!(acc.min, Some(16_567));
    }

    #[test]
    fn period_exactly_at_threshold_is_valid() {
        let mut acc = WindowAccumulator::default();
        acc.record_edge(10, MIN_PERIOD);
        acc.record_edge(10 + MIN_PERIOD as Micros, MIN_PERIOD);
        assert_eq!(acc.count, 1);
    }

    #[test]
    fn huge_gap_saturates_period() {
        let mut acc = WindowAccumulator::default();
        acc.record_edge(0, MIN_PERIOD);
        acc.record_edge(u64::from(u32::MAX) * 4, MIN_PERIOD);

        assert_eq!(acc.max, Some(Period::MAX));
        assert_eq!(acc.sum_sq, u64::from(Period::MAX) * u64::from(Period::MAX));
    }

    #[test]
    fn reconnect_folds_dropout_into_one_window() {
        let shared = SharedAccumulator::new(MIN_PERIOD);
        shared.record_edge(0);
        shared.record_edge(16_667);
        shared.drain();

        // Signal returns two seconds later; the gap closes one long period.
        shared.record_edge(2_016_667);
        shared.record_edge(2_033_334);
        let skewed = shared.drain();
        assert_eq!(skewed.count, 2);
        assert_eq!(skewed.max, Some(2_000_000));
        assert_eq!(skewed.min, Some(16_667));

        shared.record_edge(2_050_001);
        let clean = shared.drain();
        assert_eq!(clean.count, 1);
        assert_eq!(clean.max, Some(16_667));
    }

    #[test]
    fn drain_resets_window_but_keeps_last_edge() {
        let shared = SharedAccumulator::new(MIN_PERIOD);
        shared.record_edge(0);
        shared.record_edge(16_667);

        let first = shared.drain();
        assert_eq!(first.count, 1);
        assert_eq!(first.last_edge, Some(16_667));

        let second = shared.drain();
        assert_eq!(second.count, 0);
        assert_eq!(second.sum, 0);
        assert_eq!(second.min, None);
        assert_eq!(second.last_edge, Some(16_667));

        // The next edge still measures against the edge before the drain.
        shared.record_edge(33_334);
        assert_eq!(shared.drain().sum, 16_667);
    }

    #[test]
    fn edge_capture_reads_its_clock() {
        let clock = Arc::new(FakeClock(AtomicU64::new(100)));
        let shared = Arc::new(SharedAccumulator::new(MIN_PERIOD));
        let capture = EdgeCapture::new(clock.clone(), shared.clone());

        capture.on_edge();
        clock.0.store(20_100, Ordering::SeqCst);
        capture.on_edge();

        let snapshot = shared.drain();
        assert_eq!(snapshot.last_edge, Some(20_100));
        assert_eq!(snapshot.sum, 20_000);
    }

    #[test]
    fn concurrent_edges_are_never_lost_across_drains() {
        let shared = Arc::new(SharedAccumulator::new(1));
        let writer = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for i in 1..=10_000u64 {
                    shared.record_edge(i * 10);
                }
            })
        };

        let mut total = 0u64;
        while !writer.is_finished() {
            total += u64::from(shared.drain().count);
        }
        writer.join().unwrap();
        total += u64::from(shared.drain().count);

        assert_eq!(total, 9_999);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let shared = Arc::new(SharedAccumulator::new(MIN_PERIOD));
        let poisoner = shared.clone();
        let _ = std::thread::spawn(move || {
            poisoner.critical_section(|_| panic!("boom"));
        })
        .join();

        shared.record_edge(5);
        assert_eq!(shared.drain().last_edge, Some(5));
    }

    proptest! {
        #[test]
        fn short_periods_never_change_totals(
            start in 0u64..1_000_000_000,
            good in MIN_PERIOD..100_000u32,
            short in 0u32..MIN_PERIOD,
        ) {
            let mut acc = WindowAccumulator::default();
            acc.record_edge(start, MIN_PERIOD);
            acc.record_edge(start + u64::from(good), MIN_PERIOD);
            let before = acc;

            acc.record_edge(start + u64::from(good) + u64::from(short), MIN_PERIOD);

            prop_assert_eq!(acc.count, before.count);
            prop_assert_eq!(acc.sum, before.sum);
            prop_assert_eq!(acc.sum_sq, before.sum_sq);
            prop_assert_eq!(acc.min, before.min);
            prop_assert_eq!(acc.max, before.max);
        }

        #[test]
        fn retained_periods_respect_threshold(gaps in prop::collection::vec(0u32..40_000, 1..200)) {
            let mut acc = WindowAccumulator::default();
            let mut now = 0u64;
            acc.record_edge(now, MIN_PERIOD);
            for gap in gaps {
                now += u64::from(gap);
                acc.record_edge(now, MIN_PERIOD);
            }

            if let Some(min) = acc.min {
                prop_assert!(min >= MIN_PERIOD);
            } else {
                prop_assert_eq!(acc.count, 0);
            }
        }
    }
}

//! Metrics Aggregator: a bounded ring of workload samples
//! submitted by applications, reduced to an aggregate once per governor
//! tick.

use critical_section::Mutex;
use core::cell::RefCell;

/// Ring capacity.
pub const CAPACITY: usize = 128;

/// One workload sample submitted by an application.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSample {
    /// Arbitrary application-defined workload identifier/weight.
    pub workload: u32,
    /// Reported intensity, `0..=100`.
    pub intensity: u32,
    /// How long the reported unit of work took, in milliseconds.
    pub duration_ms: u32,
    /// Timestamp the sample was submitted, in milliseconds.
    pub timestamp_ms: u32,
}

/// Reduction of the live region of the ring into one aggregate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregate {
    /// Number of samples the aggregate was computed over.
    pub count: u32,
    /// Mean `workload` across the live region.
    pub avg_workload: u32,
    /// Mean `intensity` across the live region.
    pub avg_intensity: u32,
    /// Mean `duration_ms` across the live region.
    pub avg_duration_ms: u32,
    /// Timestamp of the most recently submitted sample in the live region.
    pub last_ts_ms: u32,
}

/// A fixed-capacity ring of [`MetricsSample`]s. Overwrites the oldest entry
/// once full. No heap allocation.
pub struct MetricsRing {
    samples: [MetricsSample; CAPACITY],
    head: usize,
    tail: usize,
    count: usize,
}

impl Default for MetricsRing {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRing {
    /// Build an empty ring. `const` so [`SharedMetricsRing::new_const`] can
    /// seed a `static` without a runtime initializer.
    pub const fn new() -> Self {
        MetricsRing {
            samples: [MetricsSample { workload: 0, intensity: 0, duration_ms: 0, timestamp_ms: 0 }; CAPACITY],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Append a sample, overwriting the oldest one if the ring is full.
    pub fn submit(&mut self, workload: u32, intensity: u32, duration_ms: u32, timestamp_ms: u32) {
        let sample = MetricsSample { workload, intensity, duration_ms, timestamp_ms };
        self.samples[self.tail] = sample;
        self.tail = (self.tail + 1) % CAPACITY;
        if self.count < CAPACITY {
            self.count += 1;
        } else {
            // Ring was full: the tail just overwrote the old head, so the
            // head advances along with it.
            self.head = (self.head + 1) % CAPACITY;
        }
    }

    /// Reduce the live region to an aggregate. If `clear` is set, the ring
    /// is emptied atomically with the reduction.
    pub fn get_aggregate(&mut self, clear: bool) -> MetricsAggregate {
        if self.count == 0 {
            if clear {
                self.head = 0;
                self.tail = 0;
            }
            return MetricsAggregate::default();
        }

        let mut workload_sum: u64 = 0;
        let mut intensity_sum: u64 = 0;
        let mut duration_sum: u64 = 0;
        let mut last_ts_ms = 0;

        let mut idx = self.head;
        for _ in 0..self.count {
            let s = self.samples[idx];
            workload_sum += s.workload as u64;
            intensity_sum += s.intensity as u64;
            duration_sum += s.duration_ms as u64;
            last_ts_ms = s.timestamp_ms;
            idx = (idx + 1) % CAPACITY;
        }

        let count = self.count as u32;
        let aggregate = MetricsAggregate {
            count,
            avg_workload: (workload_sum / self.count as u64) as u32,
            avg_intensity: (intensity_sum / self.count as u64) as u32,
            avg_duration_ms: (duration_sum / self.count as u64) as u32,
            last_ts_ms,
        };

        if clear {
            self.head = 0;
            self.tail = 0;
            self.count = 0;
        }

        aggregate
    }

    /// Number of live samples currently in the ring.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the ring currently holds no samples.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// The metrics ring behind the `critical_section::Mutex<RefCell<_>>` guard
/// used for every non-atomic shared region in this crate.
pub struct SharedMetricsRing {
    inner: Mutex<RefCell<MetricsRing>>,
}

impl Default for SharedMetricsRing {
    fn default() -> Self {
        Self::new_const()
    }
}

impl SharedMetricsRing {
    /// Build an empty guarded ring. `const` so this can seed a `'static`
    /// instance in `src/bin/firmware.rs`.
    pub const fn new_const() -> Self {
        SharedMetricsRing { inner: Mutex::new(RefCell::new(MetricsRing::new())) }
    }

    /// Submit a sample from any context (application code on either core).
    pub fn submit(&self, workload: u32, intensity: u32, duration_ms: u32, timestamp_ms: u32) {
        critical_section::with(|cs| {
            self.inner.borrow_ref_mut(cs).submit(workload, intensity, duration_ms, timestamp_ms);
        });
    }

    /// Reduce and optionally clear, under the same critical section.
    pub fn get_aggregate(&self, clear: bool) -> MetricsAggregate {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).get_aggregate(clear))
    }
}

/// Second, simpler "kernel snapshot" channel: governor tick
/// cadence and the last-seen tick latency, published by copy-under-lock.
#[derive(Debug, Clone, Copy)]
pub struct KernelSnapshot {
    /// Total number of governor ticks executed since boot.
    pub gov_tick_count: u32,
    /// Exponential-ish rolling average of a governor tick's wall time, in
    /// milliseconds (simple cumulative mean; the governor loop runs slowly
    /// enough that this is cheap and accurate).
    pub gov_tick_avg_ms: u32,
    /// Timestamp of the last completed governor tick.
    pub last_ts_ms: u32,
}

/// Shared kernel snapshot, guarded the same way as [`SharedMetricsRing`].
pub struct SharedKernelSnapshot {
    inner: Mutex<RefCell<KernelSnapshot>>,
}

impl Default for SharedKernelSnapshot {
    fn default() -> Self {
        Self::new_const()
    }
}

impl SharedKernelSnapshot {
    /// Build a fresh guarded snapshot. `const` so this can seed a `'static`
    /// instance in `src/bin/firmware.rs`.
    pub const fn new_const() -> Self {
        SharedKernelSnapshot { inner: Mutex::new(RefCell::new(KernelSnapshot { gov_tick_count: 0, gov_tick_avg_ms: 0, last_ts_ms: 0 })) }
    }

    /// Record a just-completed governor tick.
    pub fn record_tick(&self, tick_ms: u32, now_ms: u32) {
        critical_section::with(|cs| {
            let mut snap = self.inner.borrow_ref_mut(cs);
            let n = snap.gov_tick_count as u64;
            let new_avg = (snap.gov_tick_avg_ms as u64 * n + tick_ms as u64) / (n + 1);
            snap.gov_tick_count += 1;
            snap.gov_tick_avg_ms = new_avg as u32;
            snap.last_ts_ms = now_ms;
        });
    }

    /// Get a consistent copy of the snapshot.
    pub fn get(&self) -> KernelSnapshot {
        critical_section::with(|cs| *self.inner.borrow_ref(cs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_metrics_aggregate_and_clear() {
        let mut ring = MetricsRing::default();
        for (intensity, duration) in [(10, 100), (20, 200), (30, 300), (40, 400), (50, 500)] {
            ring.submit(1, intensity, duration, duration as u32);
        }
        let agg = ring.get_aggregate(true);
        assert_eq!(agg.count, 5);
        assert_eq!(agg.avg_intensity, 30);
        assert_eq!(agg.avg_duration_ms, 300);

        let agg2 = ring.get_aggregate(false);
        assert_eq!(agg2.count, 0);
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut ring = MetricsRing::default();
        for i in 0..(CAPACITY as u32 + 10) {
            ring.submit(i, i % 100, i, i);
        }
        assert_eq!(ring.len(), CAPACITY);
        // The oldest surviving sample's workload must be 10 (0..10 were
        // evicted by the time CAPACITY+10 submissions have happened).
        let agg = ring.get_aggregate(false);
        assert_eq!(agg.count as usize, CAPACITY);
    }

    #[test]
    fn shared_ring_round_trips_through_mutex() {
        let shared = SharedMetricsRing::default();
        shared.submit(1, 50, 100, 10);
        shared.submit(1, 60, 120, 20);
        let agg = shared.get_aggregate(true);
        assert_eq!(agg.count, 2);
        assert_eq!(shared.get_aggregate(false).count, 0);
    }

    #[test]
    fn kernel_snapshot_averages_tick_times() {
        let snap = SharedKernelSnapshot::default();
        snap.record_tick(10, 100);
        snap.record_tick(20, 140);
        let s = snap.get();
        assert_eq!(s.gov_tick_count, 2);
        assert_eq!(s.gov_tick_avg_ms, 15);
        assert_eq!(s.last_ts_ms, 140);
    }
}

//! Thread-safe accumulation of operation outcomes and latencies.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Upper bound on retained latency samples.
///
/// Once the buffer is full, further latencies are dropped rather than
/// rotated, so percentiles are computed over a sample of the run instead of
/// a sliding window.
const MAX_SAMPLES: usize = 100_000;

/// Thread-safe accumulator of operation outcomes and latencies.
///
/// Workers record into the collector concurrently; [`snapshot`](Self::snapshot)
/// can be taken at any time and computes throughput and percentiles from a
/// copy of the sample buffer.
#[derive(Debug)]
pub struct Collector {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    total: u64,
    success: u64,
    failure: u64,
    latencies: Vec<Duration>,
    started: Instant,
}

/// Point-in-time copy of the collected metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    /// Total units of work attempted since the last reset.
    pub total: u64,
    /// Units of work that completed successfully.
    pub success: u64,
    /// Units of work that failed.
    pub failure: u64,
    /// Attempted units per second since the last reset.
    pub rate: f64,
    /// Mean latency over the retained samples, in milliseconds.
    pub avg_latency_ms: f64,
    /// 50th percentile latency, in milliseconds.
    pub p50_latency_ms: f64,
    /// 95th percentile latency, in milliseconds.
    pub p95_latency_ms: f64,
    /// 99th percentile latency, in milliseconds.
    pub p99_latency_ms: f64,
    /// Seconds elapsed since the last reset.
    pub elapsed_seconds: f64,
}

impl Collector {
    /// Creates an empty collector with its elapsed-time clock started now.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                total: 0,
                success: 0,
                failure: 0,
                latencies: Vec::new(),
                started: Instant::now(),
            }),
        }
    }

    /// Records `count` successful units of work observed with the given
    /// latency.
    ///
    /// The latency is appended to the sample buffer while it is below
    /// capacity.
    pub fn record_success(&self, latency: Duration, count: u64) {
        let mut inner = self.inner.write().unwrap();

        inner.total += count;
        inner.success += count;

        if inner.latencies.len() < MAX_SAMPLES {
            inner.latencies.push(latency);
        }
    }

    /// Records `count` failed units of work.
    ///
    /// Failures do not contribute latency samples.
    pub fn record_failure(&self, count: u64) {
        let mut inner = self.inner.write().unwrap();

        inner.total += count;
        inner.failure += count;
    }

    /// Returns a point-in-time copy of counters, throughput and latency
    /// percentiles.
    ///
    /// Percentiles are computed by sorting a copy of the sample buffer; with
    /// zero samples all latency figures report as zero.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().unwrap();

        let elapsed = inner.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            inner.total as f64 / elapsed
        } else {
            0.0
        };

        let mut avg_latency_ms = 0.0;
        let mut p50_latency_ms = 0.0;
        let mut p95_latency_ms = 0.0;
        let mut p99_latency_ms = 0.0;

        if !inner.latencies.is_empty() {
            let sum: Duration = inner.latencies.iter().sum();
            avg_latency_ms = to_millis(sum) / inner.latencies.len() as f64;

            let mut sorted = inner.latencies.clone();
            sorted.sort_unstable();

            p50_latency_ms = percentile(&sorted, 50);
            p95_latency_ms = percentile(&sorted, 95);
            p99_latency_ms = percentile(&sorted, 99);
        }

        Snapshot {
            total: inner.total,
            success: inner.success,
            failure: inner.failure,
            rate,
            avg_latency_ms,
            p50_latency_ms,
            p95_latency_ms,
            p99_latency_ms,
            elapsed_seconds: elapsed,
        }
    }

    /// Zeroes all counters, empties the sample buffer and restarts the
    /// elapsed-time clock.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap();

        inner.total = 0;
        inner.success = 0;
        inner.failure = 0;
        inner.latencies.clear();
        inner.started = Instant::now();
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the latency at percentile `p` of an ascending sample set.
///
/// The index is `floor(len * p / 100)`, clamped into the valid range.
fn percentile(sorted: &[Duration], p: usize) -> f64 {
    let index = (sorted.len() * p / 100).min(sorted.len() - 1);
    to_millis(sorted[index])
}

fn to_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

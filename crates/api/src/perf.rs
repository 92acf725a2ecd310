//! Performance Monitor (spec §4.12): per-container transaction counters,
//! a reservoir-sampled latency distribution, a sliding-window QPS
//! estimate, and a capped slow-query log.
//!
//! Grounded on the teacher's mutex-guarded counter convention
//! (`crates/concurrency/src/manager.rs`'s `TransactionManager`),
//! generalized from fixed atomic counters to the reservoir/window/ring
//! buffer trio spec §4.12 names. "Shared resources ... Perf monitor
//! buffers: mutex-guarded circular buffers and counters" (spec §5) is
//! mirrored directly: every buffer here is `parking_lot::Mutex`-guarded,
//! none of them held across a suspension point.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tunables for [`PerfMonitor`].
#[derive(Debug, Clone, Copy)]
pub struct PerfMonitorConfig {
    /// Maximum number of latency samples retained for percentile
    /// computation.
    pub reservoir_size: usize,
    /// Width of the sliding window QPS is computed over (spec default:
    /// 60s).
    pub qps_window: Duration,
    /// Minimum duration for a transaction to be appended to the
    /// slow-query log.
    pub slow_query_threshold: Duration,
    /// Maximum number of entries kept in the slow-query log; oldest
    /// entries are evicted first.
    pub slow_query_log_capacity: usize,
}

impl Default for PerfMonitorConfig {
    fn default() -> Self {
        Self {
            reservoir_size: 1000,
            qps_window: Duration::from_secs(60),
            slow_query_threshold: Duration::from_millis(100),
            slow_query_log_capacity: 100,
        }
    }
}

/// One slow transaction's record.
#[derive(Debug, Clone)]
pub struct SlowQueryEntry {
    /// Caller-supplied label identifying what ran (e.g. `"save"`,
    /// `"sparql"`).
    pub label: String,
    /// How long the transaction took.
    pub duration: Duration,
    /// Whether the transaction ultimately failed.
    pub failed: bool,
}

#[derive(Default)]
struct Counters {
    active: i64,
    total: u64,
    successful: u64,
    failed: u64,
    cancelled: u64,
}

/// Reservoir sampling (Algorithm R): retains a uniform random sample of
/// up to `capacity` observations from an arbitrarily long stream without
/// storing the whole stream.
struct Reservoir {
    samples: Vec<Duration>,
    seen: u64,
    capacity: usize,
}

impl Reservoir {
    fn new(capacity: usize) -> Self {
        Self { samples: Vec::with_capacity(capacity), seen: 0, capacity }
    }

    fn observe(&mut self, value: Duration) {
        self.seen += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(value);
            return;
        }
        let idx = rand::thread_rng().gen_range(0..self.seen);
        if (idx as usize) < self.capacity {
            self.samples[idx as usize] = value;
        }
    }

    fn percentile(&self, p: f64) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort();
        let rank = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
        Some(sorted[rank.min(sorted.len() - 1)])
    }
}

struct QpsWindow {
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl QpsWindow {
    fn new(window: Duration) -> Self {
        Self { window, timestamps: VecDeque::new() }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
        self.evict(now);
    }

    fn rate(&mut self, now: Instant) -> f64 {
        self.evict(now);
        self.timestamps.len() as f64 / self.window.as_secs_f64()
    }
}

/// A consistent snapshot of [`PerfMonitor`]'s counters and derived
/// statistics at one point in time.
#[derive(Debug, Clone)]
pub struct PerfSnapshot {
    /// Transactions currently in flight (created but not yet finished).
    pub active: i64,
    /// Total transactions ever created.
    pub total: u64,
    /// Transactions that committed successfully.
    pub successful: u64,
    /// Transactions that failed.
    pub failed: u64,
    /// Transactions cancelled before completion.
    pub cancelled: u64,
    /// Transactions per second over the configured sliding window.
    pub qps: f64,
    /// Median latency, if any samples have been observed.
    pub p50: Option<Duration>,
    /// 95th percentile latency.
    pub p95: Option<Duration>,
    /// 99th percentile latency.
    pub p99: Option<Duration>,
}

/// Per-container transaction event sink (spec §4.12): `created`,
/// `committing`, `committed(duration)`, `failed(duration)`, `cancelled`,
/// and `closed` all fold into the counters, reservoir, QPS window, and
/// slow-query log exposed here.
pub struct PerfMonitor {
    config: PerfMonitorConfig,
    counters: Mutex<Counters>,
    reservoir: Mutex<Reservoir>,
    qps: Mutex<QpsWindow>,
    slow_queries: Mutex<VecDeque<SlowQueryEntry>>,
}

impl PerfMonitor {
    /// Construct a monitor with the given tunables.
    pub fn new(config: PerfMonitorConfig) -> Self {
        Self {
            reservoir: Mutex::new(Reservoir::new(config.reservoir_size)),
            qps: Mutex::new(QpsWindow::new(config.qps_window)),
            slow_queries: Mutex::new(VecDeque::with_capacity(config.slow_query_log_capacity)),
            counters: Mutex::new(Counters::default()),
            config,
        }
    }

    /// A transaction attempt began.
    pub fn on_created(&self) {
        let mut c = self.counters.lock();
        c.active += 1;
        c.total += 1;
    }

    /// A transaction committed successfully after `duration`.
    pub fn on_committed(&self, label: &str, duration: Duration) {
        self.finish(label, duration, false);
        self.counters.lock().successful += 1;
    }

    /// A transaction failed after `duration`.
    pub fn on_failed(&self, label: &str, duration: Duration) {
        self.finish(label, duration, true);
        self.counters.lock().failed += 1;
    }

    /// A transaction was cancelled before it finished.
    pub fn on_cancelled(&self) {
        let mut c = self.counters.lock();
        c.active -= 1;
        c.cancelled += 1;
    }

    fn finish(&self, label: &str, duration: Duration, failed: bool) {
        self.counters.lock().active -= 1;
        self.reservoir.lock().observe(duration);
        self.qps.lock().record(Instant::now());
        if duration >= self.config.slow_query_threshold {
            let mut log = self.slow_queries.lock();
            if log.len() == self.config.slow_query_log_capacity {
                log.pop_front();
            }
            log.push_back(SlowQueryEntry { label: label.to_string(), duration, failed });
        }
    }

    /// A consistent snapshot of every counter and derived statistic.
    pub fn snapshot(&self) -> PerfSnapshot {
        let c = self.counters.lock();
        let reservoir = self.reservoir.lock();
        let mut qps_guard = self.qps.lock();
        PerfSnapshot {
            active: c.active,
            total: c.total,
            successful: c.successful,
            failed: c.failed,
            cancelled: c.cancelled,
            qps: qps_guard.rate(Instant::now()),
            p50: reservoir.percentile(50.0),
            p95: reservoir.percentile(95.0),
            p99: reservoir.percentile(99.0),
        }
    }

    /// The slow-query log's current contents, oldest first.
    pub fn slow_queries(&self) -> Vec<SlowQueryEntry> {
        self.slow_queries.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservoir_caps_at_capacity() {
        let mut r = Reservoir::new(10);
        for i in 0..1000 {
            r.observe(Duration::from_millis(i));
        }
        assert_eq!(r.samples.len(), 10);
        assert_eq!(r.seen, 1000);
    }

    #[test]
    fn percentile_is_none_when_empty() {
        let r = Reservoir::new(10);
        assert_eq!(r.percentile(50.0), None);
    }

    #[test]
    fn qps_window_evicts_stale_timestamps() {
        let mut w = QpsWindow::new(Duration::from_millis(10));
        let t0 = Instant::now();
        w.record(t0);
        let later = t0 + Duration::from_millis(50);
        assert_eq!(w.rate(later), 0.0);
    }

    #[test]
    fn slow_query_log_caps_and_evicts_oldest() {
        let monitor = PerfMonitor::new(PerfMonitorConfig {
            slow_query_threshold: Duration::from_millis(0),
            slow_query_log_capacity: 2,
            ..PerfMonitorConfig::default()
        });
        monitor.on_created();
        monitor.on_committed("a", Duration::from_millis(1));
        monitor.on_created();
        monitor.on_committed("b", Duration::from_millis(1));
        monitor.on_created();
        monitor.on_committed("c", Duration::from_millis(1));

        let log = monitor.slow_queries();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].label, "b");
        assert_eq!(log[1].label, "c");
    }

    #[test]
    fn snapshot_reflects_counters() {
        let monitor = PerfMonitor::new(PerfMonitorConfig::default());
        monitor.on_created();
        monitor.on_committed("x", Duration::from_millis(1));
        monitor.on_created();
        monitor.on_failed("y", Duration::from_millis(1));
        monitor.on_created();
        monitor.on_cancelled();

        let snap = monitor.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.successful, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.cancelled, 1);
        assert_eq!(snap.active, 0);
        assert!(snap.p50.is_some());
    }
}

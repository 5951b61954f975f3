//! Statistics tracking for the dataloader
//!
//! Counters are plain atomics shared between the consumer and the worker
//! tasks, so reading them never blocks iteration.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistics for a single loader stage
#[derive(Debug, Default)]
pub struct StageStats {
    /// Total items processed
    items: AtomicU64,
    /// Total bytes processed
    bytes: AtomicU64,
    /// Sum of latencies in microseconds (for averaging)
    total_latency_us: AtomicU64,
    /// Maximum latency observed in microseconds
    max_latency_us: AtomicU64,
    /// Minimum latency observed in microseconds
    min_latency_us: AtomicU64,
}

impl StageStats {
    /// Create new stage statistics
    pub fn new() -> Self {
        Self {
            min_latency_us: AtomicU64::new(u64::MAX),
            ..Default::default()
        }
    }

    /// Record one processed item
    pub fn record(&self, bytes: usize, latency: Duration) {
        let latency_us = latency.as_micros() as u64;

        self.items.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);
        self.min_latency_us.fetch_min(latency_us, Ordering::Relaxed);
    }

    /// Get number of items processed
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    /// Get bytes processed
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Get average latency
    pub fn avg_latency(&self) -> Duration {
        let items = self.items();
        if items == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.total_latency_us.load(Ordering::Relaxed) / items)
    }

    /// Get maximum latency
    pub fn max_latency(&self) -> Duration {
        Duration::from_micros(self.max_latency_us.load(Ordering::Relaxed))
    }

    /// Get minimum latency
    pub fn min_latency(&self) -> Duration {
        let min = self.min_latency_us.load(Ordering::Relaxed);
        if min == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_micros(min)
        }
    }
}

/// Aggregated loader statistics
#[derive(Debug)]
pub struct LoaderStats {
    /// Creation time of the loader
    start_time: Instant,
    /// Reading and decoding one record
    pub read: StageStats,
    /// User transform
    pub transform: StageStats,
    /// Batch assembly
    pub collate: StageStats,
    /// Records that left the shuffle stage
    records_emitted: AtomicU64,
    /// Batches handed to the consumer
    batches_emitted: AtomicU64,
    /// Positions skipped as corrupt
    skipped: AtomicU64,
    /// Worker tasks currently alive
    live_workers: AtomicUsize,
}

impl Default for LoaderStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderStats {
    /// Create new loader statistics
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            read: StageStats::new(),
            transform: StageStats::new(),
            collate: StageStats::new(),
            records_emitted: AtomicU64::new(0),
            batches_emitted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            live_workers: AtomicUsize::new(0),
        }
    }

    /// Record a record leaving the shuffle stage
    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch handed to the consumer
    pub fn record_batch(&self) {
        self.batches_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped position
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_started(&self) {
        self.live_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn worker_stopped(&self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
    }

    /// Get elapsed time since the loader was built
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get number of records emitted
    pub fn records(&self) -> u64 {
        self.records_emitted.load(Ordering::Relaxed)
    }

    /// Get number of batches emitted
    pub fn batches(&self) -> u64 {
        self.batches_emitted.load(Ordering::Relaxed)
    }

    /// Get number of skipped positions
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Get number of live worker tasks
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Get total bytes read
    pub fn bytes_read(&self) -> u64 {
        self.read.bytes()
    }

    /// Get records per second since the loader was built
    pub fn records_per_sec(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.records() as f64 / elapsed
    }

    /// Generate a summary report
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            elapsed: self.elapsed(),
            records: self.records(),
            batches: self.batches(),
            skipped: self.skipped(),
            bytes_read: self.bytes_read(),
            records_per_sec: self.records_per_sec(),
            read_avg_latency: self.read.avg_latency(),
            read_max_latency: self.read.max_latency(),
            transform_avg_latency: self.transform.avg_latency(),
            collate_avg_latency: self.collate.avg_latency(),
            live_workers: self.live_workers(),
        }
    }
}

/// Summary of loader statistics
#[derive(Debug, Clone)]
pub struct StatsSummary {
    /// Total elapsed time
    pub elapsed: Duration,
    /// Records emitted
    pub records: u64,
    /// Batches emitted
    pub batches: u64,
    /// Positions skipped as corrupt
    pub skipped: u64,
    /// Bytes read and decoded
    pub bytes_read: u64,
    /// Records per second
    pub records_per_sec: f64,
    /// Average read latency
    pub read_avg_latency: Duration,
    /// Worst read latency
    pub read_max_latency: Duration,
    /// Average transform latency
    pub transform_avg_latency: Duration,
    /// Average collate latency
    pub collate_avg_latency: Duration,
    /// Workers alive when the summary was taken
    pub live_workers: usize,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Loader Statistics:")?;
        writeln!(f, "  Elapsed: {:?}", self.elapsed)?;
        writeln!(f, "  Records: {} ({:.1}/s)", self.records, self.records_per_sec)?;
        writeln!(f, "  Batches: {}", self.batches)?;
        writeln!(f, "  Skipped: {}", self.skipped)?;
        writeln!(
            f,
            "  Bytes read: {} ({:.2} MB)",
            self.bytes_read,
            self.bytes_read as f64 / (1024.0 * 1024.0)
        )?;
        writeln!(f, "  Latency:")?;
        writeln!(f, "    Read (avg):      {:?}", self.read_avg_latency)?;
        writeln!(f, "    Read (max):      {:?}", self.read_max_latency)?;
        writeln!(f, "    Transform (avg): {:?}", self.transform_avg_latency)?;
        writeln!(f, "    Collate (avg):   {:?}", self.collate_avg_latency)?;
        writeln!(f, "  Live workers: {}", self.live_workers)?;
        Ok(())
    }
}

/// Shared statistics handle for use across worker tasks
pub type SharedStats = Arc<LoaderStats>;

/// Keeps the live-worker gauge up while a worker task exists
pub(crate) struct WorkerGuard {
    stats: SharedStats,
}

impl WorkerGuard {
    pub(crate) fn new(stats: SharedStats) -> Self {
        stats.worker_started();
        Self { stats }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.stats.worker_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_stats_record() {
        let stats = StageStats::new();

        stats.record(1024, Duration::from_micros(100));
        stats.record(2048, Duration::from_micros(300));

        assert_eq!(stats.items(), 2);
        assert_eq!(stats.bytes(), 3072);
        assert_eq!(stats.avg_latency(), Duration::from_micros(200));
        assert_eq!(stats.max_latency(), Duration::from_micros(300));
        assert_eq!(stats.min_latency(), Duration::from_micros(100));
    }

    #[test]
    fn test_empty_stage() {
        let stats = StageStats::new();
        assert_eq!(stats.avg_latency(), Duration::ZERO);
        assert_eq!(stats.min_latency(), Duration::ZERO);
    }

    #[test]
    fn test_counters() {
        let stats = LoaderStats::new();
        stats.record_emitted();
        stats.record_emitted();
        stats.record_batch();
        stats.record_skipped();
        stats.read.record(100, Duration::from_millis(1));

        assert_eq!(stats.records(), 2);
        assert_eq!(stats.batches(), 1);
        assert_eq!(stats.skipped(), 1);
        assert_eq!(stats.bytes_read(), 100);
    }

    #[test]
    fn test_worker_guard() {
        let stats: SharedStats = Arc::new(LoaderStats::new());
        {
            let _a = WorkerGuard::new(Arc::clone(&stats));
            let _b = WorkerGuard::new(Arc::clone(&stats));
            assert_eq!(stats.live_workers(), 2);
        }
        assert_eq!(stats.live_workers(), 0);
    }

    #[test]
    fn test_summary_display() {
        let stats = LoaderStats::new();
        stats.record_emitted();
        let summary = stats.summary();
        let display = format!("{}", summary);
        assert!(display.contains("Loader Statistics"));
        assert!(display.contains("Records: 1"));
    }
}

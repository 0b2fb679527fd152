use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Application-wide runtime metrics.
///
/// All counters use `Relaxed` ordering — they are independent
/// observations; no cross-variable synchronisation is required.
///
/// Share via `Arc<Metrics>`.
pub struct Metrics {
    /// Total bucket events consumed from RabbitMQ since startup.
    pub events_received: AtomicU64,

    /// Transcription jobs successfully created by the transcribe stage.
    pub jobs_submitted: AtomicU64,

    /// Documents rendered and uploaded by the convert stage.
    pub documents_converted: AtomicU64,

    /// Events that were skipped because no stage handles their key prefix.
    pub events_ignored: AtomicU64,

    /// Events that exhausted all retries or failed deterministically and
    /// published a final error result.
    pub events_failed: AtomicU64,

    /// Events that were sent to the retry queue at least once.
    /// A single event can contribute multiple counts if it retries repeatedly.
    pub events_retried: AtomicU64,

    /// Current number of events actively being processed (gauge).
    /// Incremented at task start, decremented at task end regardless of outcome.
    pub events_in_flight: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            jobs_submitted: AtomicU64::new(0),
            documents_converted: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
            events_retried: AtomicU64::new(0),
            events_in_flight: AtomicI64::new(0),
        }
    }

    // ── Convenience increment methods ──────────────────────────────────────────

    pub fn inc_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_converted(&self) {
        self.documents_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.events_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retried(&self) {
        self.events_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_in_flight(&self) {
        self.events_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_in_flight(&self) {
        self.events_in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    // ── Snapshot ───────────────────────────────────────────────────────────────

    /// Return a point-in-time snapshot of all counters. Because reads are
    /// `Relaxed`, the snapshot is approximate but sufficient for
    /// observability purposes.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received:  self.events_received.load(Ordering::Relaxed),
            submitted: self.jobs_submitted.load(Ordering::Relaxed),
            converted: self.documents_converted.load(Ordering::Relaxed),
            ignored:   self.events_ignored.load(Ordering::Relaxed),
            failed:    self.events_failed.load(Ordering::Relaxed),
            retried:   self.events_retried.load(Ordering::Relaxed),
            in_flight: self.events_in_flight.load(Ordering::Relaxed),
        }
    }

    /// Log a summary of all metrics via `tracing`.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            received  = s.received,
            submitted = s.submitted,
            converted = s.converted,
            ignored   = s.ignored,
            failed    = s.failed,
            retried   = s.retried,
            in_flight = s.in_flight,
            "📊 metrics summary"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of [`Metrics`] counters.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub received:  u64,
    pub submitted: u64,
    pub converted: u64,
    pub ignored:   u64,
    pub failed:    u64,
    pub retried:   u64,
    pub in_flight: i64,
}

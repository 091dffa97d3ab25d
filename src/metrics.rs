use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload and question traffic.
#[derive(Default)]
pub struct RagMetrics {
    files_uploaded: AtomicU64,
    documents_stored: AtomicU64,
    questions_answered: AtomicU64,
    empty_retrievals: AtomicU64,
}

impl RagMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed upload and the number of page documents it stored.
    pub fn record_upload(&self, file_count: u64, document_count: u64) {
        self.files_uploaded.fetch_add(file_count, Ordering::Relaxed);
        self.documents_stored
            .fetch_add(document_count, Ordering::Relaxed);
    }

    /// Record an answered question; `empty_context` marks answers produced without any
    /// retrieved document.
    pub fn record_answer(&self, empty_context: bool) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        if empty_context {
            self.empty_retrievals.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_uploaded: self.files_uploaded.load(Ordering::Relaxed),
            documents_stored: self.documents_stored.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            empty_retrievals: self.empty_retrievals.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of files accepted by `/upload` since startup.
    pub files_uploaded: u64,
    /// Number of page documents written to the index.
    pub documents_stored: u64,
    /// Number of questions answered.
    pub questions_answered: u64,
    /// Questions answered with an empty context because nothing was retrieved.
    pub empty_retrievals: u64,
}

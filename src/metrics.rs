use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestMetrics {
    documents_ingested: AtomicU64,
    pages_indexed: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed document and the number of pages stored for it.
    pub fn record_document(&self, page_count: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.pages_indexed.fetch_add(page_count, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            pages_indexed: self.pages_indexed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents ingested since startup.
    pub documents_ingested: u64,
    /// Total page count stored across all ingested documents.
    pub pages_indexed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_documents_and_pages() {
        let metrics = IngestMetrics::new();
        metrics.record_document(3);
        metrics.record_document(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 2);
        assert_eq!(snapshot.pages_indexed, 5);
    }

    #[test]
    fn snapshot_starts_empty() {
        let metrics = IngestMetrics::new();
        assert_eq!(metrics.snapshot().documents_ingested, 0);
        assert_eq!(metrics.snapshot().pages_indexed, 0);
    }
}

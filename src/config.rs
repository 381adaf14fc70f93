//! Tunable constants shared by the scanners, the orchestrator and the
//! selection handler.

use std::time::Duration;

/// Configuration for scanning and selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Maximum number of entries per metadata prefetch request.
    pub prefetch_chunk_size: usize,
    /// Number of prefetch requests allowed in flight for one chunk.
    pub prefetch_concurrency: usize,
    /// Delay before a Drive search hits the network, giving a newer search
    /// the chance to cancel it.
    pub drive_search_delay: Duration,
    /// Maximum number of results forwarded by the Drive scanners.
    pub drive_max_results: usize,
    /// Maximum number of results requested from the indexed local search.
    pub local_search_max_results: usize,
    /// Number of entries returned per directory read by the local backend.
    pub read_batch_size: usize,
    /// Delay before heavy selection properties are computed.
    pub selection_update_delay: Duration,
    /// Selections of at least this many items always wait the full delay.
    pub selection_bulk_threshold: usize,
    /// Interval used to coalesce store updates, one per frame.
    pub frame_interval: Duration,
    /// Timeout applied to each local filesystem operation.
    pub operation_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            prefetch_chunk_size: 25,
            prefetch_concurrency: 4,
            drive_search_delay: Duration::from_millis(200),
            drive_max_results: 100,
            local_search_max_results: 100,
            read_batch_size: 100,
            selection_update_delay: Duration::from_millis(200),
            selection_bulk_threshold: 100,
            frame_interval: Duration::from_millis(16),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

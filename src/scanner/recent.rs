use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{check_cancelled, ScanSink};
use crate::filesystem::{FileCategory, FileSystem, SourceRestriction};
use crate::Result;

/// Lists recently used files, narrowed by name and by volume visibility.
pub struct RecentContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    query: String,
    source: SourceRestriction,
    category: FileCategory,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> RecentContentScanner<F> {
    pub fn new(
        filesystem: Arc<F>,
        query: &str,
        source: SourceRestriction,
        category: FileCategory,
        token: CancellationToken,
    ) -> Self {
        Self {
            filesystem,
            query: query.to_lowercase(),
            source,
            category,
            token,
        }
    }

    pub(crate) async fn scan(&self, sink: &ScanSink, invalidate_cache: bool) {
        sink.finish(self.list(sink, invalidate_cache).await);
    }

    async fn list(&self, sink: &ScanSink, invalidate_cache: bool) -> Result<()> {
        let entries = self
            .filesystem
            .recent_files(self.source, self.category, invalidate_cache)
            .await;
        check_cancelled(&self.token)?;

        let entries = entries.inspect_err(|e| tracing::warn!("Failed to list recent files: {}", e))?;
        let total = entries.len();
        let visible: Vec<_> = entries
            .into_iter()
            .filter(|entry| entry.name().to_lowercase().contains(&self.query))
            // Entries on volumes the caller cannot see are dropped.
            .filter(|entry| self.filesystem.volume_info(entry).is_some())
            .collect();
        tracing::debug!(total, visible = visible.len(), "recent files listed");

        sink.entries(visible);
        Ok(())
    }
}

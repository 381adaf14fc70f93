use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{check_cancelled, ScanSink};
use crate::filesystem::{DirectoryReader, FileSystem};
use crate::{Entry, Result};

/// Merges the content of every trash location into one listing.
///
/// Locations are read strictly one after the other: the reader of location
/// `i + 1` is only created once location `i` is exhausted.
pub struct TrashContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    locations: Vec<Entry>,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> TrashContentScanner<F> {
    pub fn new(filesystem: Arc<F>, locations: Vec<Entry>, token: CancellationToken) -> Self {
        Self {
            filesystem,
            locations,
            token,
        }
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        sink.finish(self.read_all(sink).await);
    }

    async fn read_all(&self, sink: &ScanSink) -> Result<()> {
        for location in &self.locations {
            let mut reader = self.filesystem.create_reader(location)?;
            loop {
                let batch = reader.read_entries().await?;
                check_cancelled(&self.token)?;
                if batch.is_empty() {
                    break;
                }
                sink.entries(batch);
            }
            tracing::debug!(location = location.url(), "trash location read");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{collect, ScanMessage};
    use crate::MemoryFileSystem;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn reads_locations_sequentially() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.set_read_delay(Duration::from_millis(10));
        let locations: Vec<Entry> = (0..3)
            .map(|i| Entry::directory(&format!("trash{i}:"), "/.Trash/files"))
            .collect();
        for location in &locations {
            fs.add_directory(
                location,
                vec![vec![location.child("a", false)], vec![location.child("b", false)]],
            );
        }

        let scanner = TrashContentScanner::new(fs, locations, CancellationToken::new());
        let (sink, rx) = ScanSink::channel();
        scanner.scan(&sink).await;
        drop(sink);

        let order: Vec<String> = collect(rx)
            .await
            .into_iter()
            .filter_map(|message| match message {
                ScanMessage::Entries(entries) => Some(entries),
                _ => None,
            })
            .flatten()
            .map(|entry| entry.url().to_owned())
            .collect();

        assert_eq!(
            order,
            vec![
                "trash0:/.Trash/files/a",
                "trash0:/.Trash/files/b",
                "trash1:/.Trash/files/a",
                "trash1:/.Trash/files/b",
                "trash2:/.Trash/files/a",
                "trash2:/.Trash/files/b",
            ]
        );
    }
}

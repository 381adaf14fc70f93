use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::{check_cancelled, read_entries_recursively, ScanSink};
use crate::filesystem::{DirectoryReader, FileSystem};
use crate::{Entry, Result};

/// Lists the children of one directory, batch by batch.
pub struct DirectoryContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    entry: Entry,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> DirectoryContentScanner<F> {
    pub fn new(filesystem: Arc<F>, entry: Entry, token: CancellationToken) -> Self {
        Self {
            filesystem,
            entry,
            token,
        }
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        sink.finish(self.read_all(sink).await);
    }

    async fn read_all(&self, sink: &ScanSink) -> Result<()> {
        let started = Instant::now();
        let mut reader = self.filesystem.create_reader(&self.entry)?;
        let mut count = 0;

        loop {
            let batch = reader.read_entries().await?;
            check_cancelled(&self.token)?;
            if batch.is_empty() {
                tracing::debug!(
                    url = self.entry.url(),
                    count,
                    elapsed = ?started.elapsed(),
                    "directory scan finished"
                );
                return Ok(());
            }
            count += batch.len();
            sink.entries(batch);
        }
    }
}

/// Presents a media provider tree as one flat list of its files.
pub struct MediaViewContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    root: Entry,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> MediaViewContentScanner<F> {
    pub fn new(filesystem: Arc<F>, root: Entry, token: CancellationToken) -> Self {
        Self {
            filesystem,
            root,
            token,
        }
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        let result = read_entries_recursively(&*self.filesystem, &self.root, &self.token, |batch| {
            sink.entries(batch.into_iter().filter(Entry::is_file).collect());
        })
        .await;
        sink.finish(result);
    }
}

//! Content scanners: one asynchronous enumeration or search per instance.
//!
//! A scanner streams its results into a [`ScanSink`] as non-empty chunks of
//! entries followed by its terminal outcome. Every scanner is built with a
//! [`CancellationToken`] and checks it at each yield point; once the token
//! fires the only message a scanner may still send is
//! [`ScanError::Abort`].

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    filesystem::{DirectoryReader, FileSystem},
    Entry, Result, ScanError,
};

mod directory;
mod mount;
mod recent;
mod search;
mod search_v2;
mod trash;

pub use directory::{DirectoryContentScanner, MediaViewContentScanner};
pub use mount::{CrostiniMounter, GuestOsMounter};
pub use recent::RecentContentScanner;
pub use search::{DriveMetadataSearchContentScanner, DriveSearchContentScanner, LocalSearchContentScanner};
pub use search_v2::{earliest_timestamp, SearchLocation, SearchRecency, SearchV2ContentScanner};
pub use trash::TrashContentScanner;

/// A message emitted by a scanner.
#[derive(Debug, Clone)]
pub enum ScanMessage {
    /// A non-empty chunk of entries, in emission order.
    Entries(Vec<Entry>),
    /// The scan completed.
    Success,
    /// The scan failed or observed its cancellation.
    Error(ScanError),
}

/// The receiving end scanners emit into.
#[derive(Debug, Clone)]
pub struct ScanSink {
    tx: mpsc::UnboundedSender<ScanMessage>,
}

impl ScanSink {
    /// Create a sink and the receiver its messages arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Forward a chunk of entries. Empty chunks are dropped.
    pub fn entries(&self, entries: Vec<Entry>) {
        if !entries.is_empty() {
            let _ = self.tx.send(ScanMessage::Entries(entries));
        }
    }

    pub fn success(&self) {
        let _ = self.tx.send(ScanMessage::Success);
    }

    pub fn error(&self, error: ScanError) {
        let _ = self.tx.send(ScanMessage::Error(error));
    }

    /// Report `result` as the terminal message.
    pub fn finish(&self, result: Result<()>) {
        match result {
            Ok(()) => self.success(),
            Err(error) => self.error(error),
        }
    }
}

/// One scan over one source of entries.
///
/// The variants share the `scan`/`cancel` capability; the orchestrator picks
/// one through its scanner factory. A scanner is scanned at most once.
pub enum ContentScanner<F: FileSystem> {
    Directory(DirectoryContentScanner<F>),
    DriveSearch(DriveSearchContentScanner<F>),
    LocalSearch(LocalSearchContentScanner<F>),
    SearchV2(SearchV2ContentScanner<F>),
    DriveMetadataSearch(DriveMetadataSearchContentScanner<F>),
    Recent(RecentContentScanner<F>),
    MediaView(MediaViewContentScanner<F>),
    Crostini(CrostiniMounter<F>),
    GuestOs(GuestOsMounter<F>),
    Trash(TrashContentScanner<F>),
}

impl<F: FileSystem> ContentScanner<F> {
    /// Run the scan, streaming chunks and the terminal outcome into `sink`.
    ///
    /// The sink is dropped when the scan returns, which closes the channel.
    pub async fn scan(&self, sink: ScanSink, invalidate_cache: bool) {
        match self {
            Self::Directory(scanner) => scanner.scan(&sink).await,
            Self::DriveSearch(scanner) => scanner.scan(&sink).await,
            Self::LocalSearch(scanner) => scanner.scan(&sink).await,
            Self::SearchV2(scanner) => scanner.scan(&sink).await,
            Self::DriveMetadataSearch(scanner) => scanner.scan(&sink).await,
            Self::Recent(scanner) => scanner.scan(&sink, invalidate_cache).await,
            Self::MediaView(scanner) => scanner.scan(&sink).await,
            Self::Crostini(scanner) => scanner.scan(&sink).await,
            Self::GuestOs(scanner) => scanner.scan(&sink).await,
            Self::Trash(scanner) => scanner.scan(&sink).await,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token().cancel();
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        match self {
            Self::Directory(scanner) => &scanner.token,
            Self::DriveSearch(scanner) => &scanner.token,
            Self::LocalSearch(scanner) => &scanner.token,
            Self::SearchV2(scanner) => &scanner.token,
            Self::DriveMetadataSearch(scanner) => &scanner.token,
            Self::Recent(scanner) => &scanner.token,
            Self::MediaView(scanner) => &scanner.token,
            Self::Crostini(scanner) => &scanner.token,
            Self::GuestOs(scanner) => &scanner.token,
            Self::Trash(scanner) => &scanner.token,
        }
    }
}

macro_rules! impl_from_scanner {
    ($($variant:ident($scanner:ident)),* $(,)?) => {
        $(
            impl<F: FileSystem> From<$scanner<F>> for ContentScanner<F> {
                fn from(scanner: $scanner<F>) -> Self {
                    Self::$variant(scanner)
                }
            }
        )*
    };
}

impl_from_scanner!(
    Directory(DirectoryContentScanner),
    DriveSearch(DriveSearchContentScanner),
    LocalSearch(LocalSearchContentScanner),
    SearchV2(SearchV2ContentScanner),
    DriveMetadataSearch(DriveMetadataSearchContentScanner),
    Recent(RecentContentScanner),
    MediaView(MediaViewContentScanner),
    Crostini(CrostiniMounter),
    GuestOs(GuestOsMounter),
    Trash(TrashContentScanner),
);

/// Fails with [`ScanError::Abort`] once `token` has fired.
pub(crate) fn check_cancelled(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(ScanError::Abort)
    } else {
        Ok(())
    }
}

/// Walk the tree under `root` breadth-first, handing every non-empty batch of
/// children to `on_entries`. Symlinked directories are listed, not entered.
///
/// # Errors
///
/// Returns the first read error, or [`ScanError::Abort`] when `token` fires
/// between two reads.
pub async fn read_entries_recursively<F, C>(
    filesystem: &F,
    root: &Entry,
    token: &CancellationToken,
    mut on_entries: C,
) -> Result<()>
where
    F: FileSystem,
    C: FnMut(Vec<Entry>) + Send,
{
    let mut pending = VecDeque::from([root.clone()]);

    while let Some(dir) = pending.pop_front() {
        check_cancelled(token)?;
        let mut reader = filesystem.create_reader(&dir)?;
        loop {
            let batch = reader.read_entries().await?;
            check_cancelled(token)?;
            if batch.is_empty() {
                break;
            }
            pending.extend(batch.iter().filter(|entry| entry.is_dir() && !entry.is_symlink()).cloned());
            on_entries(batch);
        }
    }

    Ok(())
}

/// Drain `rx` into the list of messages a scanner produced.
#[cfg(test)]
pub(crate) async fn collect(mut rx: mpsc::UnboundedReceiver<ScanMessage>) -> Vec<ScanMessage> {
    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }
    messages
}

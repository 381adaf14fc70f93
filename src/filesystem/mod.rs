//! Backing-store abstraction for the scanning engine.
//!
//! This module provides a trait-based abstraction for everything the scanners
//! consume: directory enumeration, remote and indexed search, recent files,
//! metadata and guest volume mounting. The engine works with both the local
//! filesystem and scripted in-memory stores through a common interface.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{Entry, Metadata, MetadataProperty, Result, ScanError, VolumeInfo};

mod local;
mod memory;

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

/// A file category used to narrow searches and recent-file listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileCategory {
    #[default]
    All,
    Audio,
    Image,
    Video,
    Document,
}

impl FileCategory {
    /// Returns `true` if a file called `name` belongs to the category.
    ///
    /// Classification is by extension; directories never match a specific
    /// category.
    #[must_use]
    pub fn matches(self, name: &str, is_dir: bool) -> bool {
        if self == Self::All {
            return true;
        }
        if is_dir {
            return false;
        }
        let Some((_, extension)) = name.rsplit_once('.') else {
            return false;
        };
        let extension = extension.to_ascii_lowercase();
        let known: &[&str] = match self {
            Self::All => return true,
            Self::Audio => &["mp3", "flac", "ogg", "oga", "opus", "wav", "m4a", "aac"],
            Self::Image => &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "heic", "avif"],
            Self::Video => &["mp4", "m4v", "mkv", "webm", "avi", "mov", "3gp"],
            Self::Document => &[
                "pdf", "txt", "md", "doc", "docx", "odt", "rtf", "xls", "xlsx", "ods", "csv",
                "ppt", "pptx", "odp",
            ],
        };
        known.contains(&extension.as_str())
    }
}

/// Parameters of a remote Drive full-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveSearchParams {
    pub query: String,
    pub category: FileCategory,
    /// Pagination cursor returned by a previous page, `None` for the first.
    pub cursor: Option<String>,
    pub modified_after: Option<DateTime<Utc>>,
}

/// One page of Drive search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveSearchPage {
    pub entries: Vec<Entry>,
    pub next_cursor: Option<String>,
}

/// Which Drive metadata listing to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveSearchType {
    All,
    SharedWithMe,
    RecentFiles,
    Offline,
}

/// Parameters of the indexed local search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSearchParams {
    pub root: Entry,
    pub query: String,
    pub category: FileCategory,
    pub modified_after: Option<DateTime<Utc>>,
    pub max_results: usize,
}

/// Which sources contribute to the recent-files listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceRestriction {
    #[default]
    AnySource,
    NativeSource,
    NativeOrDriveSource,
}

/// Connectivity of the Drive backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DriveConnectionState {
    #[default]
    Online,
    Metered,
    Offline,
}

/// Reads the children of one directory in batches.
///
/// An empty batch signals the end of the enumeration.
pub trait DirectoryReader: Send {
    /// Read the next batch of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory can no longer be read.
    fn read_entries(&mut self) -> impl Future<Output = Result<Vec<Entry>>> + Send;
}

/// A trait for abstracting the backing store.
///
/// Directory enumeration, metadata and volume lookup are mandatory. The remote
/// services have default implementations that reject the call, so a plain
/// filesystem only implements what it supports.
///
/// All I/O methods are async and their futures are `Send`, so scans can run
/// on any tokio task.
pub trait FileSystem: Send + Sync + 'static {
    /// The reader returned by [`create_reader`](FileSystem::create_reader).
    type Reader: DirectoryReader;

    /// Create a reader over the children of `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidModification`] if `dir` cannot be
    /// enumerated.
    fn create_reader(&self, dir: &Entry) -> Result<Self::Reader>;

    /// Fetch metadata for `entries`, returning one record per entry in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the request.
    fn get_metadata(
        &self,
        entries: &[Entry],
        properties: &[MetadataProperty],
    ) -> impl Future<Output = Result<Vec<Metadata>>> + Send;

    /// Look up the volume `entry` belongs to.
    ///
    /// Returns `None` when the volume is unknown or not visible to the caller.
    fn volume_info(&self, entry: &Entry) -> Option<VolumeInfo>;

    /// Current connectivity of the Drive backend.
    fn drive_connection_state(&self) -> DriveConnectionState {
        DriveConnectionState::Online
    }

    /// Run one page of a remote Drive search.
    fn search_drive(
        &self,
        params: DriveSearchParams,
    ) -> impl Future<Output = Result<DriveSearchPage>> + Send {
        let _ = params;
        async { Err(unsupported("Drive search")) }
    }

    /// List Drive entries of the given kind.
    fn search_drive_metadata(
        &self,
        search_type: DriveSearchType,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<Entry>>> + Send {
        let _ = (search_type, max_results);
        async { Err(unsupported("Drive metadata search")) }
    }

    /// Run the indexed local search.
    fn search_files(
        &self,
        params: LocalSearchParams,
    ) -> impl Future<Output = Result<Vec<Entry>>> + Send {
        let _ = params;
        async { Err(unsupported("local search")) }
    }

    /// List recently used files.
    fn recent_files(
        &self,
        source: SourceRestriction,
        category: FileCategory,
        invalidate_cache: bool,
    ) -> impl Future<Output = Result<Vec<Entry>>> + Send {
        let _ = (source, category, invalidate_cache);
        async { Err(unsupported("recent files")) }
    }

    /// Mount the Crostini volume.
    ///
    /// # Errors
    ///
    /// Returns the backend message as [`ScanError::CrostiniConnect`].
    fn mount_crostini(&self) -> impl Future<Output = Result<()>> + Send {
        async { Err(ScanError::CrostiniConnect("unsupported".to_owned())) }
    }

    /// Mount the volume of the guest OS `guest_id`.
    ///
    /// # Errors
    ///
    /// Returns the backend message as [`ScanError::GuestOsConnect`].
    fn mount_guest(&self, guest_id: u32) -> impl Future<Output = Result<()>> + Send {
        let _ = guest_id;
        async { Err(ScanError::GuestOsConnect("unsupported".to_owned())) }
    }
}

fn unsupported(service: &str) -> ScanError {
    ScanError::NotReadable(format!("{service} is not supported by this backend"))
}

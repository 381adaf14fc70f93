//! Asynchronous directory-content scanning for file browsers.
//!
//! A [`DirectoryContents`] runs one [`ContentScanner`] (a directory listing, a
//! Drive or local search, recent files, a trash merge...) against a
//! [`FileSystem`], filters and dedupes the incoming entries into a sorted
//! [`FileListModel`], prefetches their metadata and announces the scan's
//! life cycle through [`DirectoryContentsEvent`]s. A [`FileSelectionHandler`]
//! tracks the selected subset of that list.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod directory_contents;
pub mod empty_folder;
pub mod entry;
pub mod error;
pub mod file_filter;
pub mod file_list;
pub mod file_selection;
pub mod filesystem;
pub mod guest_os;
pub mod metadata;
pub mod scanner;

pub use config::ScanConfig;
pub use directory_contents::{DirectoryContents, DirectoryContentsEvent, ScanState, ScannerFactory};
pub use empty_folder::{EmptyFolderController, EmptyFolderState};
pub use entry::{Entry, RootType, VolumeInfo};
pub use error::{ScanError, ScanErrorKind};
pub use file_filter::FileFilter;
pub use file_list::{FileListChange, FileListContext, FileListModel, SortDirection};
pub use file_selection::{
    AllowedPaths, FileSelection, FileSelectionHandler, SelectionEvent, SelectionStore, SelectionUpdate,
};
pub use filesystem::{
    DirectoryReader, DriveConnectionState, DriveSearchType, FileCategory, FileSystem, LocalFileSystem,
    MemoryFileSystem, SourceRestriction,
};
pub use guest_os::{GuestOsController, GuestOsPlaceholder};
pub use metadata::{Metadata, MetadataModel, MetadataProperty};
pub use scanner::{ContentScanner, ScanMessage, ScanSink};

pub type Result<T> = std::result::Result<T, ScanError>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

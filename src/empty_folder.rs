//! Which empty-state message, if any, the file list shows.

use crate::directory_contents::{DirectoryContents, DirectoryContentsEvent};
use crate::filesystem::FileSystem;
use crate::RootType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmptyFolderState {
    #[default]
    Hidden,
    EmptyFolder,
    NoSearchResults,
    EmptyTrash,
}

/// Tracks the empty-state message of one file list from the events of the
/// contents it displays.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFolderController {
    state: EmptyFolderState,
}

impl EmptyFolderController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> EmptyFolderState {
        self.state
    }

    /// Hide the message while a new scan starts.
    pub fn on_scan_started(&mut self) -> EmptyFolderState {
        self.state = EmptyFolderState::Hidden;
        self.state
    }

    /// React to an event of `contents`.
    pub fn on_event<F: FileSystem>(
        &mut self,
        event: &DirectoryContentsEvent,
        contents: &DirectoryContents<F>,
    ) -> EmptyFolderState {
        self.state = match event {
            DirectoryContentsEvent::ScanCancelled => EmptyFolderState::Hidden,
            DirectoryContentsEvent::ScanUpdated
            | DirectoryContentsEvent::ScanCompleted
            | DirectoryContentsEvent::ScanFailed(_) => Self::evaluate(contents),
        };
        self.state
    }

    fn evaluate<F: FileSystem>(contents: &DirectoryContents<F>) -> EmptyFolderState {
        if contents.is_scanning() || !contents.file_list().is_empty() {
            return EmptyFolderState::Hidden;
        }
        if contents.is_search() {
            return EmptyFolderState::NoSearchResults;
        }
        let in_trash = contents
            .directory_entry()
            .and_then(|entry| entry.root_type())
            .is_some_and(|root| root == RootType::Trash);
        if in_trash {
            EmptyFolderState::EmptyTrash
        } else {
            EmptyFolderState::EmptyFolder
        }
    }
}

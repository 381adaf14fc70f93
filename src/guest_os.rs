//! Registry of guest operating systems and the placeholders shown for them
//! before their volume is mounted.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::directory_contents::{DirectoryContents, DirectoryContentsEvent};
use crate::filesystem::FileSystem;
use crate::scanner::GuestOsMounter;
use crate::{lock, Entry, FileListContext, Result, RootType, ScanError};

const PLACEHOLDER_ROOT_URL: &str = "fake-entry://guest-os";

#[derive(Debug, Clone)]
struct Guest {
    name: String,
    mounted: bool,
}

/// A navigable stand-in for the volume of a guest that is not mounted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestOsPlaceholder {
    pub guest_id: u32,
    pub name: String,
    pub entry: Entry,
}

/// Keeps track of the registered guests and mounts them on demand.
#[derive(Debug)]
pub struct GuestOsController<F: FileSystem> {
    filesystem: Arc<F>,
    guests: Mutex<BTreeMap<u32, Guest>>,
}

impl<F: FileSystem> GuestOsController<F> {
    pub fn new(filesystem: Arc<F>) -> Self {
        Self {
            filesystem,
            guests: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register guest `guest_id`, replacing its name if already known.
    pub fn register(&self, guest_id: u32, name: &str) {
        let mut guests = lock(&self.guests);
        let mounted = guests.get(&guest_id).is_some_and(|guest| guest.mounted);
        guests.insert(
            guest_id,
            Guest {
                name: name.to_owned(),
                mounted,
            },
        );
        tracing::debug!(guest_id, name, "guest registered");
    }

    pub fn unregister(&self, guest_id: u32) {
        lock(&self.guests).remove(&guest_id);
    }

    pub fn set_mounted(&self, guest_id: u32, mounted: bool) {
        if let Some(guest) = lock(&self.guests).get_mut(&guest_id) {
            guest.mounted = mounted;
        }
    }

    #[must_use]
    pub fn is_mounted(&self, guest_id: u32) -> bool {
        lock(&self.guests).get(&guest_id).is_some_and(|guest| guest.mounted)
    }

    /// Placeholders of the guests whose volume is not mounted, by id.
    #[must_use]
    pub fn placeholders(&self) -> Vec<GuestOsPlaceholder> {
        lock(&self.guests)
            .iter()
            .filter(|(_, guest)| !guest.mounted)
            .map(|(&guest_id, guest)| GuestOsPlaceholder {
                guest_id,
                name: guest.name.clone(),
                entry: Entry::directory(PLACEHOLDER_ROOT_URL, &format!("/{guest_id}"))
                    .with_volume(format!("guest-os-{guest_id}"), RootType::GuestOs),
            })
            .collect()
    }

    /// The scanner mounting guest `guest_id`, if it is registered.
    pub fn mounter(&self, guest_id: u32, token: CancellationToken) -> Option<GuestOsMounter<F>> {
        lock(&self.guests)
            .contains_key(&guest_id)
            .then(|| GuestOsMounter::new(Arc::clone(&self.filesystem), guest_id, token))
    }

    /// Mount the guest behind `placeholder` by scanning its mounter contents
    /// in `context`, marking it mounted on success.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::GuestOsConnect`] if the guest is unknown or the
    /// mount fails, and [`ScanError::Abort`] if the scan was cancelled.
    pub async fn mount(&self, context: FileListContext<F>, placeholder: &GuestOsPlaceholder) -> Result<()> {
        let guest_id = placeholder.guest_id;
        if !lock(&self.guests).contains_key(&guest_id) {
            return Err(ScanError::GuestOsConnect(format!("unknown guest {guest_id}")));
        }

        let contents = DirectoryContents::for_guest_os(context, placeholder.entry.clone(), guest_id);
        let mut events = contents.subscribe();
        contents.scan(false, false).await;

        let mut outcome = Err(ScanError::Abort);
        while let Ok(event) = events.try_recv() {
            match event {
                DirectoryContentsEvent::ScanCompleted => outcome = Ok(()),
                DirectoryContentsEvent::ScanFailed(error) => outcome = Err(error),
                DirectoryContentsEvent::ScanUpdated | DirectoryContentsEvent::ScanCancelled => {}
            }
        }
        if outcome.is_ok() {
            self.set_mounted(guest_id, true);
            tracing::info!(guest_id, "guest volume mounted");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileFilter, MemoryFileSystem, ScanConfig};

    fn context(fs: &Arc<MemoryFileSystem>) -> FileListContext<MemoryFileSystem> {
        FileListContext::new(Arc::clone(fs), Arc::new(FileFilter::new()), ScanConfig::default())
    }

    #[test]
    fn only_unmounted_guests_get_placeholders() {
        let controller = GuestOsController::new(Arc::new(MemoryFileSystem::new()));
        controller.register(2, "Windows");
        controller.register(1, "Debian");
        controller.set_mounted(1, true);

        let placeholders = controller.placeholders();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].name, "Windows");
        assert_eq!(placeholders[0].entry.url(), "fake-entry://guest-os/2");
        assert_eq!(placeholders[0].entry.root_type(), Some(RootType::GuestOs));
        assert!(controller.mounter(3, CancellationToken::new()).is_none());
    }

    #[tokio::test]
    async fn mounting_replaces_the_placeholder() {
        let fs = Arc::new(MemoryFileSystem::new());
        let controller = GuestOsController::new(Arc::clone(&fs));
        controller.register(7, "Windows");
        let placeholder = controller.placeholders().remove(0);

        controller.mount(context(&fs), &placeholder).await.unwrap();

        assert!(controller.is_mounted(7));
        assert!(controller.placeholders().is_empty());
        assert_eq!(fs.mount_requests(), 1);
    }

    #[tokio::test]
    async fn failed_mount_keeps_the_placeholder() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.set_guest_mount(7, Err(ScanError::GuestOsConnect("vm stopped".to_owned())));
        let controller = GuestOsController::new(Arc::clone(&fs));
        controller.register(7, "Windows");
        let placeholder = controller.placeholders().remove(0);

        let error = controller.mount(context(&fs), &placeholder).await.unwrap_err();

        assert_eq!(error.kind().name(), "GUEST_OS_CONNECT_ERR");
        assert!(!controller.is_mounted(7));
        assert_eq!(controller.placeholders().len(), 1);
    }
}

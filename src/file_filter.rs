//! Named visibility predicates applied to every listed entry.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::{lock, Entry, RootType};

type Predicate = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

const HIDDEN_FILTER: &str = "hidden";
const ANDROID_HIDDEN_FILTER: &str = "android_hidden";
const ANDROID_DOWNLOAD_FILTER: &str = "android_download";

/// Top-level Android folders shown unless all folders are made visible.
pub const DEFAULT_ANDROID_FOLDERS: &[&str] = &["Documents", "Movies", "Music", "Pictures"];

/// Windows system files hidden inside the Plugin VM shared folder.
pub const WINDOWS_HIDDEN: &[&str] = &[
    "$RECYCLE.BIN",
    "$WINDOWS.~BT",
    "$WINDOWS.~WS",
    "Config.Msi",
    "desktop.ini",
    "hiberfil.sys",
    "pagefile.sys",
    "Recovery",
    "swapfile.sys",
    "System Volume Information",
    "thumbs.db",
];

/// Folder of the Plugin VM that aliases the Windows user's Downloads.
const PLUGIN_VM_DIRECTORY: &str = "/PvmDefault/";

/// A registry of named predicates.
///
/// An entry is visible iff every registered predicate accepts it. Every
/// mutation of the registry is announced on the `changed` channel; listeners
/// are responsible for re-filtering what they already display.
#[derive(educe::Educe)]
#[educe(Debug)]
pub struct FileFilter {
    #[educe(Debug(ignore))]
    filters: Mutex<BTreeMap<String, Predicate>>,
    #[educe(Debug(ignore))]
    changed: broadcast::Sender<()>,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileFilter {
    /// Create a filter with the built-in rules installed: hidden files and
    /// uncommon Android folders are excluded, as is the Android `Download`
    /// alias of the native Downloads volume.
    #[must_use]
    pub fn new() -> Self {
        let (changed, _) = broadcast::channel(16);
        let filter = Self {
            filters: Mutex::new(BTreeMap::new()),
            changed,
        };
        filter.set_hidden_files_visible(false);
        filter.set_all_android_folders_visible(false);
        filter.add_filter(ANDROID_DOWNLOAD_FILTER, |entry| !is_android_download_alias(entry));
        filter
    }

    /// Register (or replace) the predicate called `name`.
    pub fn add_filter<P>(&self, name: &str, predicate: P)
    where
        P: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        lock(&self.filters).insert(name.to_owned(), Arc::new(predicate));
        let _ = self.changed.send(());
    }

    pub fn remove_filter(&self, name: &str) {
        lock(&self.filters).remove(name);
        let _ = self.changed.send(());
    }

    /// Returns `true` if every registered predicate accepts `entry`.
    #[must_use]
    pub fn filter(&self, entry: &Entry) -> bool {
        lock(&self.filters).values().all(|predicate| predicate(entry))
    }

    /// Subscribe to `changed` notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }

    pub fn set_hidden_files_visible(&self, visible: bool) {
        if visible {
            self.remove_filter(HIDDEN_FILTER);
        } else {
            self.add_filter(HIDDEN_FILTER, |entry| !is_hidden(entry));
        }
    }

    #[must_use]
    pub fn is_hidden_files_visible(&self) -> bool {
        !lock(&self.filters).contains_key(HIDDEN_FILTER)
    }

    pub fn set_all_android_folders_visible(&self, visible: bool) {
        if visible {
            self.remove_filter(ANDROID_HIDDEN_FILTER);
        } else {
            self.add_filter(ANDROID_HIDDEN_FILTER, |entry| !is_uncommon_android_folder(entry));
        }
    }

    #[must_use]
    pub fn is_all_android_folders_visible(&self) -> bool {
        !lock(&self.filters).contains_key(ANDROID_HIDDEN_FILTER)
    }
}

fn is_hidden(entry: &Entry) -> bool {
    if entry.name().starts_with('.') {
        return true;
    }
    let in_plugin_vm = matches!(entry.root_type(), Some(RootType::MyFiles | RootType::Downloads))
        && entry.full_path().starts_with(PLUGIN_VM_DIRECTORY);
    in_plugin_vm && WINDOWS_HIDDEN.contains(&entry.name())
}

fn is_uncommon_android_folder(entry: &Entry) -> bool {
    if entry.root_type() != Some(RootType::AndroidFiles) {
        return false;
    }
    match entry.full_path().split('/').nth(1) {
        Some(top) if !top.is_empty() => !DEFAULT_ANDROID_FOLDERS.contains(&top),
        _ => false,
    }
}

fn is_android_download_alias(entry: &Entry) -> bool {
    entry.root_type() == Some(RootType::AndroidFiles) && entry.full_path() == "/Download"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn android(path: &str, is_dir: bool) -> Entry {
        Entry::new("filesystem:android", path, is_dir).with_volume("android", RootType::AndroidFiles)
    }

    fn my_files(path: &str) -> Entry {
        Entry::file("filesystem:myfiles", path).with_volume("myfiles", RootType::MyFiles)
    }

    #[test]
    fn dotfiles_are_hidden_until_made_visible() {
        let filter = FileFilter::new();
        let dotfile = my_files("/.bashrc");

        assert!(!filter.filter(&dotfile));
        assert!(filter.filter(&my_files("/notes.txt")));

        filter.set_hidden_files_visible(true);
        assert!(filter.is_hidden_files_visible());
        assert!(filter.filter(&dotfile));
    }

    #[test]
    fn windows_system_files_hidden_only_in_plugin_vm_folder() {
        let filter = FileFilter::new();

        assert!(!filter.filter(&my_files("/PvmDefault/pagefile.sys")));
        assert!(filter.filter(&my_files("/pagefile.sys")));
        assert!(filter.filter(&my_files("/PvmDefault/report.docx")));

        filter.set_hidden_files_visible(true);
        assert!(filter.filter(&my_files("/PvmDefault/pagefile.sys")));
    }

    #[test]
    fn uncommon_android_folders_are_hidden() {
        let filter = FileFilter::new();

        assert!(filter.filter(&android("/Pictures", true)));
        assert!(filter.filter(&android("/Music/song.mp3", false)));
        assert!(!filter.filter(&android("/Android", true)));
        assert!(!filter.filter(&android("/Android/data", true)));

        filter.set_all_android_folders_visible(true);
        assert!(filter.filter(&android("/Android", true)));
    }

    #[test]
    fn android_download_alias_is_always_hidden() {
        let filter = FileFilter::new();
        filter.set_all_android_folders_visible(true);

        assert!(!filter.filter(&android("/Download", true)));
        assert!(filter.filter(&android("/Download/file.pdf", false)));
    }

    #[test]
    fn registry_changes_are_announced() {
        let filter = FileFilter::new();
        let mut changed = filter.subscribe();

        filter.add_filter("no_pdf", |entry| !entry.name().ends_with(".pdf"));
        assert!(!filter.filter(&my_files("/a.pdf")));
        filter.remove_filter("no_pdf");
        assert!(filter.filter(&my_files("/a.pdf")));

        assert!(changed.try_recv().is_ok());
        assert!(changed.try_recv().is_ok());
        assert!(changed.try_recv().is_err());
    }
}

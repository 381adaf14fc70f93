//! Handles to files and directories living in a backing store.

/// The kind of root a volume is mounted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootType {
    Downloads,
    MyFiles,
    Drive,
    SharedDrive,
    Computers,
    SharedWithMe,
    DriveOffline,
    AndroidFiles,
    Crostini,
    GuestOs,
    Removable,
    MediaView,
    Recent,
    Trash,
    Provided,
}

impl RootType {
    /// Returns `true` for every root backed by Drive.
    #[must_use]
    pub const fn is_drive(self) -> bool {
        matches!(
            self,
            Self::Drive
                | Self::SharedDrive
                | Self::Computers
                | Self::SharedWithMe
                | Self::DriveOffline
        )
    }
}

/// Describes the volume an entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub volume_id: String,
    pub root_type: RootType,
    pub read_only: bool,
}

/// An opaque handle to a file or directory in a backing store.
///
/// Entries are never mutated by the scanning engine. The URL is computed once
/// when the entry is built and serves as its identity everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    name: String,
    full_path: String,
    is_dir: bool,
    url: String,
    volume_id: Option<String>,
    root_type: Option<RootType>,
    is_symlink: bool,
}

impl Entry {
    /// Builds an entry from the URL of its filesystem root and a
    /// slash-separated absolute path.
    ///
    /// # Examples
    ///
    /// ```
    /// use dircontents::Entry;
    ///
    /// let entry = Entry::new("filesystem:downloads", "/Photos/cat.png", false);
    /// assert_eq!(entry.name(), "cat.png");
    /// assert_eq!(entry.url(), "filesystem:downloads/Photos/cat.png");
    /// ```
    pub fn new(root_url: &str, full_path: &str, is_dir: bool) -> Self {
        let full_path = if full_path.starts_with('/') {
            full_path.to_owned()
        } else {
            format!("/{full_path}")
        };
        let name = full_path
            .rsplit('/')
            .find(|component| !component.is_empty())
            .unwrap_or("")
            .to_owned();
        let url = format!("{}{}", root_url.trim_end_matches('/'), full_path);

        Self {
            name,
            full_path,
            is_dir,
            url,
            volume_id: None,
            root_type: None,
            is_symlink: false,
        }
    }

    /// Shorthand for a file entry.
    pub fn file(root_url: &str, full_path: &str) -> Self {
        Self::new(root_url, full_path, false)
    }

    /// Shorthand for a directory entry.
    pub fn directory(root_url: &str, full_path: &str) -> Self {
        Self::new(root_url, full_path, true)
    }

    /// Attaches the volume the entry belongs to.
    #[must_use]
    pub fn with_volume(mut self, volume_id: impl Into<String>, root_type: RootType) -> Self {
        self.volume_id = Some(volume_id.into());
        self.root_type = Some(root_type);
        self
    }

    /// Marks the entry as a symbolic link to what it describes. Recursive
    /// walks list links but never descend through them.
    #[must_use]
    pub const fn as_symlink(mut self) -> Self {
        self.is_symlink = true;
        self
    }

    /// Builds a child of this directory on the same volume.
    #[must_use]
    pub fn child(&self, name: &str, is_dir: bool) -> Self {
        let full_path = format!("{}/{name}", self.full_path.trim_end_matches('/'));
        let root_url = &self.url[..self.url.len() - self.full_path.len()];
        Self {
            volume_id: self.volume_id.clone(),
            root_type: self.root_type,
            ..Self::new(root_url, &full_path, is_dir)
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.is_dir
    }

    #[inline]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// The stable identity of the entry.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[inline]
    #[must_use]
    pub fn volume_id(&self) -> Option<&str> {
        self.volume_id.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn root_type(&self) -> Option<RootType> {
        self.root_type
    }

    #[inline]
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        self.is_symlink
    }

    /// Returns `true` if the entry is the root of its volume.
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.full_path == "/"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_keeps_root_url_and_volume() {
        let root = Entry::directory("filesystem:drive", "/").with_volume("drive", RootType::Drive);
        let docs = root.child("Docs", true);
        let report = docs.child("report.txt", false);

        assert_eq!(docs.url(), "filesystem:drive/Docs");
        assert_eq!(report.full_path(), "/Docs/report.txt");
        assert_eq!(report.url(), "filesystem:drive/Docs/report.txt");
        assert_eq!(report.root_type(), Some(RootType::Drive));
        assert!(report.is_file());
        assert!(root.is_root());
    }

    #[test]
    fn relative_paths_are_anchored() {
        let entry = Entry::directory("filesystem:removable/", "usb/Music/");
        assert_eq!(entry.full_path(), "/usb/Music/");
        assert_eq!(entry.name(), "Music");
        assert_eq!(entry.url(), "filesystem:removable/usb/Music/");
    }
}

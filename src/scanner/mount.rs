use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{check_cancelled, ScanSink};
use crate::filesystem::FileSystem;
use crate::{Result, ScanError};

/// Mounts the Crostini volume. Lists nothing; the outcome is the mount's.
pub struct CrostiniMounter<F: FileSystem> {
    filesystem: Arc<F>,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> CrostiniMounter<F> {
    pub fn new(filesystem: Arc<F>, token: CancellationToken) -> Self {
        Self { filesystem, token }
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        let result = self
            .filesystem
            .mount_crostini()
            .await
            .map_err(|e| ScanError::CrostiniConnect(backend_message(&e)));
        sink.finish(settle(&self.token, result, "Crostini"));
    }
}

/// Mounts the volume of one guest OS. Lists nothing; the outcome is the
/// mount's.
pub struct GuestOsMounter<F: FileSystem> {
    filesystem: Arc<F>,
    guest_id: u32,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> GuestOsMounter<F> {
    pub fn new(filesystem: Arc<F>, guest_id: u32, token: CancellationToken) -> Self {
        Self {
            filesystem,
            guest_id,
            token,
        }
    }

    #[must_use]
    pub const fn guest_id(&self) -> u32 {
        self.guest_id
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        let result = self
            .filesystem
            .mount_guest(self.guest_id)
            .await
            .map_err(|e| ScanError::GuestOsConnect(backend_message(&e)));
        sink.finish(settle(&self.token, result, "guest OS"));
    }
}

/// The backend's own message, without the kind prefix of the display form.
fn backend_message(error: &ScanError) -> String {
    error.message().unwrap_or_else(|| error.to_string())
}

fn settle(token: &CancellationToken, result: Result<()>, volume: &str) -> Result<()> {
    check_cancelled(token)?;
    result.inspect_err(|e| tracing::warn!("Cannot mount {} volume: {}", volume, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{collect, ScanMessage};
    use crate::MemoryFileSystem;

    #[tokio::test]
    async fn successful_mount_lists_nothing() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mounter = CrostiniMounter::new(fs.clone(), CancellationToken::new());
        let (sink, rx) = ScanSink::channel();
        mounter.scan(&sink).await;
        drop(sink);
        let messages = collect(rx).await;

        assert_eq!(fs.mount_requests(), 1);
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ScanMessage::Success));
    }

    #[tokio::test]
    async fn failed_guest_mount_reports_connect_error() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.set_guest_mount(3, Err(ScanError::NotReadable("vm is not running".to_owned())));
        let mounter = GuestOsMounter::new(fs, 3, CancellationToken::new());
        let (sink, rx) = ScanSink::channel();
        mounter.scan(&sink).await;
        drop(sink);
        let messages = collect(rx).await;

        assert!(matches!(&messages[0], ScanMessage::Error(e)
            if e.kind().name() == "GUEST_OS_CONNECT_ERR"
                && e.message().as_deref() == Some("vm is not running")));
    }

    #[tokio::test]
    async fn crostini_connect_errors_pass_through() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.set_crostini_mount(Err(ScanError::CrostiniConnect("container stopped".to_owned())));
        let mounter = CrostiniMounter::new(fs, CancellationToken::new());
        let (sink, rx) = ScanSink::channel();
        mounter.scan(&sink).await;
        drop(sink);
        let messages = collect(rx).await;

        assert!(matches!(&messages[0], ScanMessage::Error(ScanError::CrostiniConnect(m)) if m == "container stopped"));
    }
}

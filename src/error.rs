use thiserror::Error;

/// Errors surfaced by scanners and the backing-store collaborators.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan was cancelled.
    #[error("scan aborted")]
    Abort,

    /// The entry cannot be enumerated, or a backend returned a malformed response.
    #[error("invalid modification")]
    InvalidModification,

    /// The backend call itself was rejected.
    #[error("not readable: {0}")]
    NotReadable(String),

    #[error("cannot mount Crostini volume: {0}")]
    CrostiniConnect(String),

    #[error("cannot mount guest OS volume: {0}")]
    GuestOsConnect(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The contract-level kind of a [`ScanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanErrorKind {
    Abort,
    InvalidModification,
    NotReadable,
    CrostiniConnect,
    GuestOsConnect,
}

impl ScanErrorKind {
    /// The wire name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Abort => "ABORT",
            Self::InvalidModification => "INVALID_MODIFICATION",
            Self::NotReadable => "NOT_READABLE",
            Self::CrostiniConnect => "CROSTINI_CONNECT_ERR",
            Self::GuestOsConnect => "GUEST_OS_CONNECT_ERR",
        }
    }
}

impl ScanError {
    #[must_use]
    pub fn kind(&self) -> ScanErrorKind {
        match self {
            Self::Abort => ScanErrorKind::Abort,
            Self::InvalidModification => ScanErrorKind::InvalidModification,
            Self::NotReadable(_) | Self::Io(_) => ScanErrorKind::NotReadable,
            Self::CrostiniConnect(_) => ScanErrorKind::CrostiniConnect,
            Self::GuestOsConnect(_) => ScanErrorKind::GuestOsConnect,
        }
    }

    /// Returns `true` if the error only reports a cancellation.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }

    /// The backend message carried by the error, if any.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Abort | Self::InvalidModification => None,
            Self::NotReadable(msg) | Self::CrostiniConnect(msg) | Self::GuestOsConnect(msg) => {
                Some(msg.clone())
            }
            Self::Io(e) => Some(e.to_string()),
        }
    }
}

// Events fan the same error out to every subscriber.
impl Clone for ScanError {
    fn clone(&self) -> Self {
        match self {
            Self::Abort => Self::Abort,
            Self::InvalidModification => Self::InvalidModification,
            Self::NotReadable(msg) => Self::NotReadable(msg.clone()),
            Self::CrostiniConnect(msg) => Self::CrostiniConnect(msg.clone()),
            Self::GuestOsConnect(msg) => Self::GuestOsConnect(msg.clone()),
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_report_not_readable() {
        let err = ScanError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.kind(), ScanErrorKind::NotReadable);
        assert_eq!(err.kind().name(), "NOT_READABLE");
        assert_eq!(err.clone().message().as_deref(), Some("denied"));
    }

    #[test]
    fn connect_errors_keep_backend_message() {
        let err = ScanError::GuestOsConnect("vm stopped".to_owned());
        assert_eq!(err.kind().name(), "GUEST_OS_CONNECT_ERR");
        assert_eq!(err.message().as_deref(), Some("vm stopped"));
        assert!(!err.is_abort());
        assert!(ScanError::Abort.is_abort());
    }
}

//! Error types for the mocking engine.

use crate::entry::Location;
use std::path::PathBuf;

/// Errors raised by entries, the registry, sockets and the record/replay codec.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("socket is not connected")]
    NotConnected,

    #[error("socket is closed")]
    SocketClosed,

    /// Registry and session store both missed and the real network is disallowed
    #[error("no entry or recording matches traffic to {0} and network access is disabled")]
    NoMatch(Location),

    #[error("recording directory {0:?} does not exist or is not a directory")]
    InvalidRecordingDir(PathBuf),

    #[error("failed to read session file {path:?}: {source}")]
    SessionRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write session file {path:?}: {source}")]
    SessionWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored exchange metadata disagrees with its content
    #[error("corrupt session for {location} (signature {signature}): {reason}")]
    CorruptSession {
        location: Location,
        signature: String,
        reason: String,
    },

    /// A captured response fragment is neither text nor a gzip member
    #[error("response fragment {index} could not be decoded: {reason}")]
    CorruptFragment { index: usize, reason: String },

    #[error("failed to serialize session store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, MockError>;

impl From<MockError> for std::io::Error {
    fn from(err: MockError) -> Self {
        use std::io::ErrorKind;
        match err {
            MockError::Io(e) => e,
            MockError::NotConnected => std::io::Error::new(ErrorKind::NotConnected, err),
            MockError::SocketClosed => std::io::Error::new(ErrorKind::BrokenPipe, err),
            MockError::NoMatch(_) => std::io::Error::new(ErrorKind::ConnectionRefused, err),
            MockError::CorruptSession { .. } | MockError::CorruptFragment { .. } => {
                std::io::Error::new(ErrorKind::InvalidData, err)
            }
            MockError::Unsupported(_) => std::io::Error::new(ErrorKind::Unsupported, err),
            other => std::io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kind_mapping() {
        let err: std::io::Error = MockError::NotConnected.into();
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);

        let err: std::io::Error = MockError::NoMatch(Location::new("example.com", 80)).into();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
        assert!(err.to_string().contains("example.com:80"));

        let err: std::io::Error = MockError::CorruptFragment {
            index: 2,
            reason: "bad".to_string(),
        }
        .into();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_io_error_passes_through() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let err: std::io::Error = MockError::Io(inner).into();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }
}

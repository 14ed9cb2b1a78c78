//! Record/replay of real exchanges for traffic no entry answers.
//!
//! On a miss the request is signed, looked up in the namespace's session
//! file and either replayed from it or forwarded to the real network,
//! captured and persisted for future runs.
//!
//! # Module Structure
//!
//! - `signature` - order-insensitive request signatures
//! - `codec` - line-fragment split and gzip handling
//! - `store` - session store and file persistence

pub mod codec;
mod signature;
mod store;

pub use signature::RequestSignature;
pub use store::{RecordedExchange, SessionStore};

use crate::entry::Location;
use crate::error::Result;
use std::path::Path;
use tracing::{debug, info};

/// Answer a request from the session file, or forward it and record the result.
///
/// `forward` performs the real exchange and returns the raw response. The
/// session file is only read and written when `session_path` is set.
pub fn replay_or_record<F>(
    session_path: Option<&Path>,
    location: &Location,
    request: &[u8],
    forward: F,
) -> Result<Vec<u8>>
where
    F: FnOnce() -> Result<Vec<u8>>,
{
    let signature = RequestSignature::from_request(request);
    let mut store = match session_path {
        Some(path) => SessionStore::load(path)?,
        None => SessionStore::new(),
    };

    if let Some(raw) = store.replay(location, &signature)? {
        debug!("Replaying recorded response for {} ({})", location, signature);
        return Ok(raw);
    }

    let raw = forward()?;
    let exchange = RecordedExchange::capture(request, &raw)?;
    store.insert(location, signature.clone(), exchange);

    if let Some(path) = session_path {
        store.save(path)?;
        info!("Recorded exchange for {} ({})", location, signature);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MockError;
    use std::cell::Cell;

    #[test]
    fn test_records_then_replays_without_forwarding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.json");
        let location = Location::new("api.example.com", 80);
        let calls = Cell::new(0);

        let forward = || {
            calls.set(calls.get() + 1);
            Ok(b"HTTP/1.1 200 OK\r\n\r\nhello".to_vec())
        };

        let first = replay_or_record(Some(&path), &location, b"GET / HTTP/1.1\r\n\r\n", forward).unwrap();
        let second = replay_or_record(Some(&path), &location, b"GET / HTTP/1.1\r\n\r\n", || {
            Err(MockError::NoMatch(location.clone()))
        })
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(SessionStore::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_without_session_path_always_forwards() {
        let location = Location::new("h", 1);
        let calls = Cell::new(0);
        for _ in 0..2 {
            replay_or_record(None, &location, b"req", || {
                calls.set(calls.get() + 1);
                Ok(b"resp".to_vec())
            })
            .unwrap();
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_forward_error_propagates() {
        let location = Location::new("h", 1);
        let err = replay_or_record(None, &location, b"req", || {
            Err(MockError::NoMatch(location.clone()))
        })
        .unwrap_err();
        assert!(matches!(err, MockError::NoMatch(_)));
    }

    #[test]
    fn test_different_ports_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ns.json");

        replay_or_record(Some(&path), &Location::new("h", 1), b"req", || Ok(b"one".to_vec())).unwrap();
        let other = replay_or_record(Some(&path), &Location::new("h", 2), b"req", || Ok(b"two".to_vec())).unwrap();

        assert_eq!(other, b"two");
        assert_eq!(SessionStore::load(&path).unwrap().len(), 2);
    }
}

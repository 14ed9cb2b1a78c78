//! Order-insensitive request signatures.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content hash of a request's sorted line fragments; the replay lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestSignature(String);

impl RequestSignature {
    /// Sign a raw outbound payload (decoded lossily as UTF-8).
    pub fn from_request(payload: &[u8]) -> Self {
        Self::from_text(&String::from_utf8_lossy(payload))
    }

    /// Sign request text. Line order does not affect the result.
    ///
    /// The digest is SHA-256 over the sorted `\r\n` fragments joined with no
    /// separator. Keys written by MD5-based recorders will not match.
    pub fn from_text(request: &str) -> Self {
        let mut fragments: Vec<&str> = request.split("\r\n").collect();
        fragments.sort_unstable();

        let mut hasher = Sha256::new();
        for fragment in fragments {
            hasher.update(fragment.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed hex signature, e.g. a key read from a session file.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! On-disk session store: one JSON document per namespace.
//!
//! Shape: `{ host: { port: { signature: { request, response, gzip } } } }`.

use super::codec::{decode_response, encode_response};
use super::signature::RequestSignature;
use crate::entry::Location;
use crate::error::{MockError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// One recorded request/response exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedExchange {
    /// Original request text
    pub request: String,
    /// Response line fragments, gzip members stored decompressed
    pub response: Vec<String>,
    /// 1-based indices into `response` to recompress at replay
    #[serde(default)]
    pub gzip: Vec<usize>,
}

impl RecordedExchange {
    /// Capture a real exchange for storage.
    pub fn capture(request: &[u8], raw_response: &[u8]) -> Result<Self> {
        let decoded = decode_response(raw_response)?;
        Ok(Self {
            request: String::from_utf8_lossy(request).into_owned(),
            response: decoded.lines,
            gzip: decoded.gzip,
        })
    }

    /// Raw response bytes as originally received.
    pub fn replay(&self) -> std::result::Result<Vec<u8>, String> {
        encode_response(&self.response, &self.gzip)
    }
}

type PortMap = BTreeMap<String, BTreeMap<String, RecordedExchange>>;

/// Recorded exchanges keyed by host, port (as string) and request signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionStore {
    hosts: BTreeMap<String, PortMap>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a session file.
    ///
    /// A missing file or a document that is not a valid session yields an
    /// empty store. Other I/O errors are returned.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Session file {:?} does not exist, starting fresh", path);
                return Ok(Self::new());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("Session file {:?} is not UTF-8, starting fresh", path);
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(MockError::SessionRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let document = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(hosts)) => hosts,
            Ok(_) => {
                warn!("Session file {:?} is not a JSON object, starting fresh", path);
                return Ok(Self::new());
            }
            Err(e) => {
                warn!("Session file {:?} is malformed ({}), starting fresh", path, e);
                return Ok(Self::new());
            }
        };

        let store = Self::from_document(path, document);
        info!("Loaded {} recordings from {:?}", store.len(), path);
        Ok(store)
    }

    /// Keep every well-formed exchange; skip the rest with a warning.
    fn from_document(path: &Path, document: Map<String, Value>) -> Self {
        let mut store = Self::new();
        for (host, ports) in document {
            let Value::Object(ports) = ports else {
                warn!("Skipping host {} in {:?}: not an object", host, path);
                continue;
            };
            for (port, signatures) in ports {
                let Value::Object(signatures) = signatures else {
                    warn!("Skipping {}:{} in {:?}: not an object", host, port, path);
                    continue;
                };
                for (signature, exchange) in signatures {
                    match serde_json::from_value::<RecordedExchange>(exchange) {
                        Ok(exchange) => {
                            store
                                .hosts
                                .entry(host.clone())
                                .or_default()
                                .entry(port.clone())
                                .or_default()
                                .insert(signature, exchange);
                        }
                        Err(e) => warn!(
                            "Skipping malformed exchange {} at {}:{} in {:?}: {}",
                            signature, host, port, path, e
                        ),
                    }
                }
            }
        }
        store
    }

    /// Overwrite the session file with the whole store.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| MockError::SessionWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved {} recordings to {:?}", self.len(), path);
        Ok(())
    }

    pub fn get(&self, location: &Location, signature: &RequestSignature) -> Option<&RecordedExchange> {
        self.hosts
            .get(&location.host)?
            .get(&location.port.to_string())?
            .get(signature.as_str())
    }

    /// Store an exchange, replacing any previous one for the same signature.
    pub fn insert(
        &mut self,
        location: &Location,
        signature: RequestSignature,
        exchange: RecordedExchange,
    ) -> Option<RecordedExchange> {
        self.hosts
            .entry(location.host.clone())
            .or_default()
            .entry(location.port.to_string())
            .or_default()
            .insert(signature.as_str().to_string(), exchange)
    }

    /// Rebuild the recorded response for a signature, if present.
    ///
    /// Inconsistent compression metadata is a [`MockError::CorruptSession`].
    pub fn replay(
        &self,
        location: &Location,
        signature: &RequestSignature,
    ) -> Result<Option<Vec<u8>>> {
        let Some(exchange) = self.get(location, signature) else {
            return Ok(None);
        };
        exchange
            .replay()
            .map(Some)
            .map_err(|reason| MockError::CorruptSession {
                location: location.clone(),
                signature: signature.to_string(),
                reason,
            })
    }

    /// Every stored exchange with its location and signature
    pub fn exchanges(&self) -> impl Iterator<Item = (&str, &str, &str, &RecordedExchange)> {
        self.hosts.iter().flat_map(|(host, ports)| {
            ports.iter().flat_map(move |(port, signatures)| {
                signatures
                    .iter()
                    .map(move |(sig, exchange)| (host.as_str(), port.as_str(), sig.as_str(), exchange))
            })
        })
    }

    /// Number of recorded exchanges
    pub fn len(&self) -> usize {
        self.hosts
            .values()
            .flat_map(|ports| ports.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

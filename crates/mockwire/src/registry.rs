//! Registry of entries, request history and session settings.
//!
//! A `Registry` is owned by the test harness and handed to sockets through a
//! [`MockConnector`]. It is the single source of truth for one mocked session.

use crate::config::MockConfig;
use crate::entry::{Entry, Location};
use crate::error::{MockError, Result};
use crate::socket::MockConnector;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

static NAMESPACE_SEQ: AtomicUsize = AtomicUsize::new(0);

fn default_namespace() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        NAMESPACE_SEQ.fetch_add(1, Ordering::SeqCst)
    )
}

/// An outbound payload observed by a matched entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub location: Location,
    pub payload: Bytes,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug)]
struct SessionSettings {
    namespace: String,
    recording_dir: Option<PathBuf>,
    allow_network: bool,
    recv_buffer_size: usize,
    enabled: bool,
}

/// Entries by location, plus the ordered request history
pub struct Registry {
    entries: RwLock<HashMap<Location, Vec<Arc<Entry>>>>,
    requests: RwLock<Vec<RecordedRequest>>,
    settings: RwLock<SessionSettings>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
            settings: RwLock::new(SessionSettings {
                namespace: default_namespace(),
                recording_dir: None,
                allow_network: true,
                recv_buffer_size: crate::config::DEFAULT_RECV_BUFFER_SIZE,
                enabled: false,
            }),
        }
    }

    /// Create a registry from validated configuration.
    ///
    /// The registry is not enabled yet; see [`Registry::enable`] or [`crate::MockScope`].
    pub fn from_config(config: &MockConfig) -> Result<Self> {
        config.validate()?;
        let registry = Self::new();
        {
            let mut settings = registry.settings.write();
            if let Some(ref namespace) = config.namespace {
                settings.namespace = namespace.clone();
            }
            settings.recording_dir = config.recording_dir.clone();
            settings.allow_network = config.allow_network;
            settings.recv_buffer_size = config.recv_buffer_size;
        }
        Ok(registry)
    }

    /// Append entries under their locations, preserving registration order.
    ///
    /// Returns shared handles to the registered entries.
    pub fn register<I>(&self, entries: I) -> Vec<Arc<Entry>>
    where
        I: IntoIterator<Item = Entry>,
    {
        entries
            .into_iter()
            .map(|entry| self.register_entry(entry))
            .collect()
    }

    /// Register a single entry
    pub fn register_entry(&self, entry: Entry) -> Arc<Entry> {
        let entry = Arc::new(entry);
        debug!(
            "Registered entry for {} ({} responses)",
            entry.location(),
            entry.responses().len()
        );
        self.entries
            .write()
            .entry(entry.location().clone())
            .or_default()
            .push(Arc::clone(&entry));
        entry
    }

    /// First entry at the location, in registration order, that accepts the payload.
    pub fn find(&self, location: &Location, payload: &[u8]) -> Option<Arc<Entry>> {
        // Matchers are user code and may touch the registry.
        let candidates = self.entries.read().get(location)?.clone();
        let found = candidates
            .into_iter()
            .find(|entry| entry.can_handle(payload));
        if found.is_none() {
            debug!("No entry at {} accepts the payload", location);
        }
        found
    }

    /// Number of entries registered at a location
    pub fn entry_count(&self, location: &Location) -> usize {
        self.entries.read().get(location).map_or(0, Vec::len)
    }

    pub fn record_request(&self, location: Location, payload: &[u8]) {
        self.requests.write().push(RecordedRequest {
            location,
            payload: Bytes::copy_from_slice(payload),
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.read().last().cloned()
    }

    /// Pop the most recent request. No-op on empty history.
    pub fn remove_last_request(&self) -> Option<RecordedRequest> {
        self.requests.write().pop()
    }

    /// Full request history, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().clone()
    }

    /// Drop every entry and the request history.
    pub fn reset(&self) {
        self.entries.write().clear();
        self.requests.write().clear();
        debug!("Registry reset");
    }

    pub fn namespace(&self) -> String {
        self.settings.read().namespace.clone()
    }

    pub fn set_namespace(&self, namespace: impl Into<String>) {
        self.settings.write().namespace = namespace.into();
    }

    pub fn recording_dir(&self) -> Option<PathBuf> {
        self.settings.read().recording_dir.clone()
    }

    /// Set the directory session files are read from and written to.
    pub fn set_recording_dir(&self, dir: Option<PathBuf>) -> Result<()> {
        if let Some(ref dir) = dir {
            ensure_dir(dir)?;
        }
        self.settings.write().recording_dir = dir;
        Ok(())
    }

    pub fn allow_network(&self) -> bool {
        self.settings.read().allow_network
    }

    pub fn set_allow_network(&self, allow: bool) {
        self.settings.write().allow_network = allow;
    }

    pub fn recv_buffer_size(&self) -> usize {
        self.settings.read().recv_buffer_size
    }

    /// Session file for the current namespace, if recording to disk
    pub fn session_path(&self) -> Option<PathBuf> {
        let settings = self.settings.read();
        settings
            .recording_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", settings.namespace)))
    }

    /// Activate mocking for a namespace, optionally recording to a directory.
    ///
    /// Without a namespace the current one is kept.
    pub fn enable(&self, namespace: Option<String>, recording_dir: Option<PathBuf>) -> Result<()> {
        if let Some(ref dir) = recording_dir {
            ensure_dir(dir)?;
        }
        let mut settings = self.settings.write();
        if let Some(namespace) = namespace {
            settings.namespace = namespace;
        }
        if recording_dir.is_some() {
            settings.recording_dir = recording_dir;
        }
        settings.enabled = true;
        info!(
            "Mocking enabled (namespace={}, recording_dir={:?})",
            settings.namespace, settings.recording_dir
        );
        Ok(())
    }

    pub fn disable(&self) {
        let mut settings = self.settings.write();
        settings.enabled = false;
        info!("Mocking disabled (namespace={})", settings.namespace);
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.read().enabled
    }

    /// Socket factory bound to this registry
    pub fn connector(self: &Arc<Self>) -> MockConnector {
        MockConnector::new(Arc::clone(self))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(MockError::InvalidRecordingDir(dir.to_path_buf()))
    }
}

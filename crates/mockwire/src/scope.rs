//! Scoped activation of a registry.

use crate::config::MockConfig;
use crate::error::Result;
use crate::registry::Registry;
use crate::socket::MockConnector;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Dotted name of the enclosing function, e.g. `my_crate.tests.test_login`.
///
/// Handy as a per-test namespace so each test gets its own session file.
#[macro_export]
macro_rules! mock_namespace {
    () => {{
        fn f() {}
        let name = ::std::any::type_name_of_val(&f);
        name.strip_suffix("::f").unwrap_or(name).replace("::", ".")
    }};
}

/// Keeps a registry enabled for as long as it is alive.
///
/// Dropping the scope disables the registry and clears its entries and
/// request history, including when the test body panics.
///
/// ```no_run
/// use mockwire::{mock_namespace, Entry, MockScope, Registry};
/// use std::sync::Arc;
///
/// let scope = MockScope::enter(Arc::new(Registry::new()), Some(mock_namespace!()), None)?;
/// scope.registry().register_entry(Entry::single(("localhost", 6379), "+PONG\r\n"));
/// # Ok::<(), mockwire::MockError>(())
/// ```
pub struct MockScope {
    registry: Arc<Registry>,
}

impl MockScope {
    pub fn enter(
        registry: Arc<Registry>,
        namespace: Option<String>,
        recording_dir: Option<PathBuf>,
    ) -> Result<Self> {
        registry.enable(namespace, recording_dir)?;
        debug!("Entered mock scope {}", registry.namespace());
        Ok(Self { registry })
    }

    /// Build a registry from configuration and enter it.
    pub fn from_config(config: &MockConfig) -> Result<Self> {
        let registry = Arc::new(Registry::from_config(config)?);
        Self::enter(registry, None, None)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn connector(&self) -> MockConnector {
        self.registry.connector()
    }
}

impl Drop for MockScope {
    fn drop(&mut self) {
        self.registry.disable();
        self.registry.reset();
        debug!("Left mock scope {}", self.registry.namespace());
    }
}

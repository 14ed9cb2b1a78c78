//! Socket test double for TCP/TLS clients.
//!
//! Code under test obtains its sockets from a [`Connector`]. Hand it a
//! [`MockConnector`] and outbound traffic is matched against [`Entry`]s held
//! by a [`Registry`]; anything no entry answers is replayed from the
//! namespace's session file, or forwarded to the real network and recorded.

// ===== Expectations =====
pub mod entry;
pub mod registry;

// ===== Sockets =====
pub mod socket;

// ===== Record/replay =====
pub mod recording;

pub mod config;
pub mod error;
mod scope;

pub use config::MockConfig;
pub use entry::{AcceptAll, Entry, Location, Matcher, Response, ResponseCursor, ResponseSpec};
pub use error::{MockError, Result};
pub use recording::{RecordedExchange, RequestSignature, SessionStore};
pub use registry::{RecordedRequest, Registry};
pub use scope::MockScope;
pub use socket::{
    Connector, MockConnector, MockSocket, NetworkConnector, PeerCertificate, RealSocket, Socket,
    SocketState,
};

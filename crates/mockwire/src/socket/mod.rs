//! Socket-shaped contract and its two implementations.
//!
//! Code under test talks to a [`Socket`] obtained from a [`Connector`]. In
//! production that is a [`NetworkConnector`]; under test it is a
//! [`MockConnector`] bound to a [`Registry`](crate::Registry), whose
//! [`MockSocket`]s answer from registered entries and recorded sessions.
//!
//! # Module Structure
//!
//! - `real` - plain TCP sockets over `socket2`
//! - `mock` - the registry-backed fake socket
//! - `cert` - synthetic peer certificates

mod cert;
mod mock;
mod real;

pub use cert::PeerCertificate;
pub use mock::{MockConnector, MockSocket};
pub use real::{NetworkConnector, RealSocket};

use crate::entry::Location;
use crate::error::Result;
use std::io::{BufRead, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// Connection lifecycle of a socket. There is no way back from `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketState {
    #[default]
    Unconnected,
    Connected,
    Closed,
}

/// Operations a stream socket offers to its caller.
pub trait Socket: Read + Write + Send {
    fn connect(&mut self, location: Location) -> Result<()>;

    /// Send the whole payload.
    fn sendall(&mut self, data: &[u8]) -> Result<()>;

    /// Send the payload, returning how many bytes were accepted.
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Receive at most `max_bytes`. An empty vector means no more data.
    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>>;

    fn close(&mut self) -> Result<()>;

    /// Buffered reader over the incoming side. `mode` is informational.
    fn makefile(&mut self, mode: &str) -> Result<Box<dyn BufRead + '_>>;

    /// Address of the connected peer
    fn peer_name(&self) -> Result<Location>;

    fn peer_cert(&self) -> Result<PeerCertificate>;

    /// Host name the caller expects to see in the peer certificate.
    fn set_server_hostname(&mut self, _host: &str) {}

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    fn timeout(&self) -> Option<Duration>;

    fn state(&self) -> SocketState;

    #[cfg(unix)]
    fn fileno(&self) -> Result<RawFd>;
}

/// Factory for sockets and name resolution.
pub trait Connector {
    type Socket: Socket;

    /// A fresh, unconnected socket
    fn socket(&self) -> Result<Self::Socket>;

    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>>;

    /// Socket connected to `location`, with `timeout` applied before connecting.
    fn create_connection(
        &self,
        location: impl Into<Location>,
        timeout: Option<Duration>,
    ) -> Result<Self::Socket> {
        let mut socket = self.socket()?;
        socket.set_timeout(timeout)?;
        socket.connect(location.into())?;
        Ok(socket)
    }
}

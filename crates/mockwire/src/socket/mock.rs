//! Registry-backed fake socket.

use super::{Connector, NetworkConnector, PeerCertificate, RealSocket, Socket, SocketState};
use crate::entry::{Entry, Location};
use crate::error::{MockError, Result};
use crate::recording::replay_or_record;
use crate::registry::Registry;
use std::fmt;
use std::io::{self, BufRead, Cursor, Read, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::io::RawFd;

/// A socket answering from the registry, then from recorded sessions, then
/// from the real network.
///
/// `connect` only stores the address. A real connection is opened lazily the
/// first time a payload matches neither an entry nor a recording.
///
/// If the registry is disabled when `connect` is called the socket passes
/// everything straight through to its real socket.
pub struct MockSocket {
    registry: Arc<Registry>,
    true_socket: RealSocket,
    buffer: Cursor<Vec<u8>>,
    state: SocketState,
    location: Option<Location>,
    server_hostname: Option<String>,
    last_entry: Option<Arc<Entry>>,
    passthrough: bool,
}

impl MockSocket {
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        Ok(Self {
            registry,
            true_socket: RealSocket::new()?,
            buffer: Cursor::new(Vec::new()),
            state: SocketState::Unconnected,
            location: None,
            server_hostname: None,
            last_entry: None,
            passthrough: false,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The real socket created alongside this one, for socket options the
    /// fake does not model.
    pub fn real_socket(&self) -> &RealSocket {
        &self.true_socket
    }

    pub fn real_socket_mut(&mut self) -> &mut RealSocket {
        &mut self.true_socket
    }

    pub fn server_hostname(&self) -> Option<&str> {
        self.server_hostname.as_deref()
    }

    /// Unread bytes of the current response
    pub fn pending(&self) -> &[u8] {
        let data = self.buffer.get_ref();
        let pos = (self.buffer.position() as usize).min(data.len());
        &data[pos..]
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    fn connected_location(&self) -> Result<Location> {
        match (self.state, &self.location) {
            (SocketState::Connected, Some(location)) => Ok(location.clone()),
            (SocketState::Closed, _) => Err(MockError::SocketClosed),
            _ => Err(MockError::NotConnected),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SocketState::Closed {
            Err(MockError::SocketClosed)
        } else {
            Ok(())
        }
    }

    fn fill_buffer(&mut self, response: Vec<u8>) {
        self.buffer = Cursor::new(response);
    }

    fn answer(&mut self, entry: &Entry, data: &[u8]) {
        entry.collect(&self.registry, data);
        let response = entry.next_response();
        self.fill_buffer(response.data().to_vec());
    }

    fn true_sendall(&mut self, location: &Location, data: &[u8]) -> Result<Vec<u8>> {
        let session_path = self.registry.session_path();
        let registry = &self.registry;
        let true_socket = &mut self.true_socket;
        replay_or_record(session_path.as_deref(), location, data, || {
            forward(true_socket, registry, location, data)
        })
    }
}

/// Send `data` over the real network and read the reply in fixed-size
/// chunks until a short read.
fn forward(
    true_socket: &mut RealSocket,
    registry: &Registry,
    location: &Location,
    data: &[u8],
) -> Result<Vec<u8>> {
    if !registry.allow_network() {
        return Err(MockError::NoMatch(location.clone()));
    }
    if !true_socket.is_connected() {
        info!("Forwarding unmatched traffic to {}", location);
        true_socket.connect(location.clone())?;
    }
    true_socket.sendall(data)?;

    let chunk_size = registry.recv_buffer_size();
    let mut response = Vec::new();
    loop {
        let chunk = true_socket.recv(chunk_size)?;
        let short = chunk.len() < chunk_size;
        response.extend_from_slice(&chunk);
        if short {
            break;
        }
    }
    debug!("Received {} bytes from {}", response.len(), location);
    Ok(response)
}

impl Socket for MockSocket {
    fn connect(&mut self, location: Location) -> Result<()> {
        self.ensure_open()?;
        if !self.registry.is_enabled() {
            debug!("Registry disabled, {} goes to the network", location);
            self.true_socket.connect(location.clone())?;
            self.passthrough = true;
        }
        debug!("Mock socket connected to {}", location);
        self.location = Some(location);
        self.state = SocketState::Connected;
        Ok(())
    }

    fn sendall(&mut self, data: &[u8]) -> Result<()> {
        if self.passthrough {
            return self.true_socket.sendall(data);
        }
        let location = self.connected_location()?;
        match self.registry.find(&location, data) {
            Some(entry) => self.answer(&entry, data),
            None => {
                let raw = self.true_sendall(&location, data)?;
                self.fill_buffer(raw);
            }
        }
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        if self.passthrough {
            return self.true_socket.send(data);
        }
        let location = self.connected_location()?;
        let entry = self.registry.find(&location, data);
        let repeated = match (&entry, &self.last_entry) {
            (Some(current), Some(previous)) => Arc::ptr_eq(current, previous),
            _ => false,
        };
        match &entry {
            Some(_) if repeated => {
                debug!("Repeated send for the same entry at {}, not re-answered", location);
            }
            Some(current) => self.answer(current, data),
            None => {
                debug!("No entry at {} for send, {} bytes dropped", location, data.len());
            }
        }
        self.last_entry = entry;
        Ok(data.len())
    }

    /// Reads up to and including the next `\n`, never more than `max_bytes`.
    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        if self.passthrough {
            return self.true_socket.recv(max_bytes);
        }
        self.ensure_open()?;
        let mut line = Vec::new();
        (&mut self.buffer)
            .take(max_bytes as u64)
            .read_until(b'\n', &mut line)?;
        Ok(line)
    }

    fn close(&mut self) -> Result<()> {
        if self.state == SocketState::Closed {
            return Ok(());
        }
        if self.true_socket.is_connected() {
            self.true_socket.close()?;
        }
        self.state = SocketState::Closed;
        debug!("Mock socket closed");
        Ok(())
    }

    fn makefile(&mut self, mode: &str) -> Result<Box<dyn BufRead + '_>> {
        if self.passthrough {
            return self.true_socket.makefile(mode);
        }
        self.ensure_open()?;
        Ok(Box::new(&mut self.buffer))
    }

    fn peer_name(&self) -> Result<Location> {
        if self.passthrough {
            return self.true_socket.peer_name();
        }
        self.location.clone().ok_or(MockError::NotConnected)
    }

    fn peer_cert(&self) -> Result<PeerCertificate> {
        if self.passthrough {
            return self.true_socket.peer_cert();
        }
        let host = match (&self.server_hostname, &self.location) {
            (Some(hostname), _) => hostname.as_str(),
            (None, Some(location)) => location.host.as_str(),
            (None, None) => return Err(MockError::NotConnected),
        };
        Ok(PeerCertificate::for_host(host))
    }

    fn set_server_hostname(&mut self, host: &str) {
        self.server_hostname = Some(host.to_string());
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.true_socket.set_timeout(timeout)
    }

    fn timeout(&self) -> Option<Duration> {
        self.true_socket.timeout()
    }

    fn state(&self) -> SocketState {
        self.state
    }

    #[cfg(unix)]
    fn fileno(&self) -> Result<RawFd> {
        self.true_socket.fileno()
    }
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.passthrough {
            return self.true_socket.read(buf);
        }
        self.ensure_open()?;
        self.buffer.read(buf)
    }
}

impl Write for MockSocket {
    /// Each write is a whole request; a miss surfaces as an error.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sendall(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.passthrough {
            return self.true_socket.flush();
        }
        Ok(())
    }
}

impl fmt::Debug for MockSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSocket")
            .field("state", &self.state)
            .field("location", &self.location)
            .field("server_hostname", &self.server_hostname)
            .field("pending", &self.pending().len())
            .field("passthrough", &self.passthrough)
            .finish()
    }
}

/// Connector handing out [`MockSocket`]s bound to one registry.
#[derive(Clone)]
pub struct MockConnector {
    registry: Arc<Registry>,
}

impl MockConnector {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl Connector for MockConnector {
    type Socket = MockSocket;

    fn socket(&self) -> Result<MockSocket> {
        MockSocket::new(Arc::clone(&self.registry))
    }

    /// Every host resolves to loopback while mocking is enabled.
    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        if self.registry.is_enabled() {
            Ok(vec![SocketAddr::from((Ipv4Addr::LOCALHOST, port))])
        } else {
            NetworkConnector.resolve(host, port)
        }
    }
}

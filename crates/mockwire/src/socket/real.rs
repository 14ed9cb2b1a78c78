//! Plain TCP sockets.

use super::{Connector, PeerCertificate, Socket, SocketState};
use crate::entry::Location;
use crate::error::{MockError, Result};
use socket2::{Domain, Protocol, SockAddr, Type};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

fn new_stream(domain: Domain) -> io::Result<socket2::Socket> {
    socket2::Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
}

fn resolve_first(location: &Location) -> Result<SocketAddr> {
    (location.host.as_str(), location.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            MockError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {location}"),
            ))
        })
}

/// A TCP stream socket. The descriptor exists from construction on.
#[derive(Debug)]
pub struct RealSocket {
    inner: Option<socket2::Socket>,
    domain: Domain,
    state: SocketState,
    peer: Option<Location>,
    timeout: Option<Duration>,
}

impl RealSocket {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: Some(new_stream(Domain::IPV4)?),
            domain: Domain::IPV4,
            state: SocketState::Unconnected,
            peer: None,
            timeout: None,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.state == SocketState::Connected
    }

    /// Underlying `socket2` handle for options this type does not wrap.
    pub fn as_socket2(&self) -> Option<&socket2::Socket> {
        self.inner.as_ref()
    }

    fn handle(&self) -> Result<&socket2::Socket> {
        self.inner.as_ref().ok_or(MockError::SocketClosed)
    }

    fn connected(&self) -> Result<&socket2::Socket> {
        match self.state {
            SocketState::Connected => self.handle(),
            SocketState::Unconnected => Err(MockError::NotConnected),
            SocketState::Closed => Err(MockError::SocketClosed),
        }
    }

    fn apply_timeout(socket: &socket2::Socket, timeout: Option<Duration>) -> io::Result<()> {
        socket.set_read_timeout(timeout)?;
        socket.set_write_timeout(timeout)
    }
}

impl Socket for RealSocket {
    fn connect(&mut self, location: Location) -> Result<()> {
        if self.state == SocketState::Closed {
            return Err(MockError::SocketClosed);
        }
        let addr = resolve_first(&location)?;

        // The descriptor was created for IPv4; IPv6 peers need a new one.
        let domain = Domain::for_address(addr);
        if domain != self.domain {
            let socket = new_stream(domain)?;
            Self::apply_timeout(&socket, self.timeout)?;
            self.inner = Some(socket);
            self.domain = domain;
        }

        let socket = self.handle()?;
        let target = SockAddr::from(addr);
        match self.timeout {
            Some(timeout) => socket.connect_timeout(&target, timeout)?,
            None => socket.connect(&target)?,
        }

        debug!("Connected to {} ({})", location, addr);
        self.state = SocketState::Connected;
        self.peer = Some(location);
        Ok(())
    }

    fn sendall(&mut self, data: &[u8]) -> Result<()> {
        let mut socket = self.connected()?;
        socket.write_all(data)?;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.connected()?.send(data)?)
    }

    fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let mut socket = self.connected()?;
        let mut buf = vec![0u8; max_bytes];
        let n = socket.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(socket) = self.inner.take() {
            if self.state == SocketState::Connected {
                // The peer may already have gone away.
                if let Err(e) = socket.shutdown(Shutdown::Both) {
                    debug!("Shutdown of real socket failed: {}", e);
                }
            }
        }
        self.state = SocketState::Closed;
        Ok(())
    }

    fn makefile(&mut self, _mode: &str) -> Result<Box<dyn BufRead + '_>> {
        let socket = self.connected()?;
        Ok(Box::new(BufReader::new(socket)))
    }

    fn peer_name(&self) -> Result<Location> {
        self.peer.clone().ok_or(MockError::NotConnected)
    }

    fn peer_cert(&self) -> Result<PeerCertificate> {
        Err(MockError::Unsupported("peer certificates on plain TCP sockets"))
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        Self::apply_timeout(self.handle()?, timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn state(&self) -> SocketState {
        self.state
    }

    #[cfg(unix)]
    fn fileno(&self) -> Result<RawFd> {
        Ok(self.handle()?.as_raw_fd())
    }
}

impl Read for RealSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut socket = self.connected()?;
        socket.read(buf)
    }
}

impl Write for RealSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut socket = self.connected()?;
        socket.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut socket = self.connected()?;
        socket.flush()
    }
}

/// Connector for the real network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector;

impl Connector for NetworkConnector {
    type Socket = RealSocket;

    fn socket(&self) -> Result<RealSocket> {
        RealSocket::new()
    }

    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_operations_before_connect() {
        let mut socket = RealSocket::new().unwrap();
        assert_eq!(socket.state(), SocketState::Unconnected);
        assert!(matches!(socket.sendall(b"x"), Err(MockError::NotConnected)));
        assert!(matches!(socket.peer_name(), Err(MockError::NotConnected)));
    }

    #[test]
    fn test_round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"pong").unwrap();
        });

        let mut socket = NetworkConnector
            .create_connection(("127.0.0.1", port), Some(Duration::from_secs(5)))
            .unwrap();
        socket.sendall(b"ping").unwrap();
        assert_eq!(socket.recv(16).unwrap(), b"pong");
        assert_eq!(socket.peer_name().unwrap(), Location::new("127.0.0.1", port));
        assert_eq!(socket.timeout(), Some(Duration::from_secs(5)));

        socket.close().unwrap();
        assert_eq!(socket.state(), SocketState::Closed);
        assert!(matches!(socket.recv(1), Err(MockError::SocketClosed)));
        server.join().unwrap();
    }

    #[test]
    fn test_close_unconnected_is_fine() {
        let mut socket = RealSocket::new().unwrap();
        socket.close().unwrap();
        assert!(socket.as_socket2().is_none());
    }

    #[test]
    fn test_peer_cert_unsupported() {
        let socket = RealSocket::new().unwrap();
        assert!(matches!(socket.peer_cert(), Err(MockError::Unsupported(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_fileno_exists_before_connect() {
        let socket = RealSocket::new().unwrap();
        assert!(socket.fileno().unwrap() >= 0);
    }
}

//! UDP socket setup

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::constants::{DEFAULT_UDP_PORT, SOCKET_RECV_BUFFER};
use crate::error::BindError;

pub use tokio::net::UdpSocket;

/// Address and port the console listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl Default for ServerEndpoint {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_UDP_PORT,
        }
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Create a non-blocking UDP socket bound to `endpoint`
///
/// The address is not marked reusable, so a port held by another process
/// is reported as [`BindError::AddressInUse`].
pub fn create_socket(endpoint: &ServerEndpoint) -> Result<std::net::UdpSocket, BindError> {
    let addr = endpoint.socket_addr();
    let label = endpoint.to_string();

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| BindError::from_io(&label, e))?;

    if let Err(e) = socket.set_recv_buffer_size(SOCKET_RECV_BUFFER) {
        tracing::warn!("Could not set receive buffer size on {}: {}", label, e);
    }

    socket
        .set_nonblocking(true)
        .map_err(|e| BindError::from_io(&label, e))?;
    socket
        .bind(&addr.into())
        .map_err(|e| BindError::from_io(&label, e))?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback(port: u16) -> ServerEndpoint {
        ServerEndpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let socket = create_socket(&loopback(0)).unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.ip().is_loopback());
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_port_in_use_is_reported() {
        let holder = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();

        let err = create_socket(&loopback(port)).unwrap_err();
        assert!(matches!(err, BindError::AddressInUse(_)), "got {:?}", err);
    }

    #[test]
    fn test_foreign_address_is_invalid() {
        // TEST-NET-1, never assigned to a local interface
        let endpoint = ServerEndpoint::new("192.0.2.1".parse().unwrap(), 0);
        let err = create_socket(&endpoint).unwrap_err();
        assert!(matches!(err, BindError::InvalidAddress(_)), "got {:?}", err);
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(ServerEndpoint::default().to_string(), "127.0.0.1:1947");
    }
}

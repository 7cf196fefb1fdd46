//! Network subsystem for UDP log ingestion

pub mod receiver;
pub mod udp;

pub use receiver::{DatagramRouter, RouterStats};
pub use udp::{create_socket, ServerEndpoint, UdpSocket};

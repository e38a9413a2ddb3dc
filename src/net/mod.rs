//! Gateway discovery, the UDP broadcaster it rides on, and the per-port
//! TCP transport.

pub mod discovery;
pub mod transport;
pub mod udp;

pub use discovery::GatewayDiscoverer;
pub use transport::PortTransport;

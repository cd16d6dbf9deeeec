//! Ports module - Trait definitions at the transport boundary
//!
//! The shell engine and the connection lifecycle only depend on these traits;
//! serial and SSH adapters implement them.

mod connector;
mod transport;

pub use connector::{SerialParams, SshParams, TransportConnector};
pub use transport::{SessionProfile, Transport};

#[cfg(test)]
pub use connector::mock::MockConnector;

#[cfg(test)]
pub use transport::mock::{MockShell, PROMPT as MOCK_PROMPT};

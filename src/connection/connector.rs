//! Transport Connector Adapter
//!
//! Concrete implementation of the `TransportConnector` port building the
//! serial and SSH transports.

use crate::error::Result;
use crate::ports::{SerialParams, SshParams, Transport, TransportConnector};
use crate::serial::SerialTransport;
use crate::ssh::SshTransport;

/// Connector producing real serial and SSH transports
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTransportConnector;

impl RealTransportConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportConnector for RealTransportConnector {
    fn ssh(&self, params: SshParams) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SshTransport::new(params)?))
    }

    fn serial(&self, params: SerialParams) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::new(params)))
    }
}

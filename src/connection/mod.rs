//! Device connection lifecycle
//!
//! Resolves a device, builds the matching transport and shell, opens it and
//! binds the command tree. Closing happens exactly once, explicitly or on drop.

mod connector;
mod context;
mod device;

pub use connector::RealTransportConnector;
pub use context::DeviceContext;
pub use device::DeviceConnection;

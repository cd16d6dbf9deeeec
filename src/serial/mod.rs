mod transport;

pub use transport::{DEFAULT_BAUD_RATE, SerialTransport};

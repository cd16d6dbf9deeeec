mod client;
mod transport;

pub use client::SshClient;
pub use transport::SshTransport;

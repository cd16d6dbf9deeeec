//! Shell protocol engine
//!
//! Turns a byte-oriented [`Transport`](crate::ports::Transport) into a
//! prompt-synchronized command/response channel: send a line, wait for the
//! prompt twice, extract what the device printed in between.

mod engine;
mod io;
mod response;
mod session;

pub use engine::Shell;
pub use io::{LINE_END, ShellIo};
pub use response::extract_response;

/// Tracing target for the `=> command` / `=< response` exchange log.
pub const EXCHANGE_TARGET: &str = "device_shell::exchange";

/// Tracing target for unprocessed response data.
pub const RAW_TARGET: &str = "device_shell::raw";

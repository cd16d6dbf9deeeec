//! Command dispatcher
//!
//! A declarative command tree bound to one [`Shell`](crate::shell::Shell):
//! paths are resolved by explicit lookup, leaves turn into shell exchanges.

mod spec;
mod tree;

pub use spec::CommandSpec;
pub use tree::{CommandNode, CommandTree};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DeviceError, Result};
use crate::shell::Shell;

use super::spec::CommandSpec;

/// One named entry of the command tree.
///
/// Immutable after construction; every node keeps a handle to the shell it
/// sends through.
#[derive(Debug, Clone)]
pub struct CommandNode {
    name: String,
    path: Vec<String>,
    children: BTreeMap<String, CommandNode>,
    shell: Arc<Shell>,
}

impl CommandNode {
    fn build(
        name: &str,
        parent: &[String],
        spec: Option<&CommandSpec>,
        shell: &Arc<Shell>,
    ) -> Self {
        let mut path = parent.to_vec();
        path.push(name.to_string());

        let children = spec
            .map(|spec| {
                spec.iter()
                    .map(|(child, grandchildren)| {
                        (
                            child.to_string(),
                            Self::build(child, &path, grandchildren, shell),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.to_string(),
            path,
            children,
            shell: Arc::clone(shell),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names from the root down to this node
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.values()
    }

    /// Look up a direct child.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchSubCommand` naming this node and the missing child.
    pub fn subcommand(&self, name: &str) -> Result<&Self> {
        self.children
            .get(name)
            .ok_or_else(|| DeviceError::NoSuchSubCommand {
                command: self.name.clone(),
                subcommand: name.to_string(),
            })
    }

    /// Line sent to the shell for this node: the full path, then the
    /// arguments, space separated.
    #[must_use]
    pub fn line(&self, args: &[&str]) -> String {
        self.path
            .iter()
            .map(String::as_str)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run this command on the device and return its stripped output.
    ///
    /// # Errors
    ///
    /// Returns `NotALeafCommand` for nodes with subcommands, otherwise any
    /// error from the shell exchange.
    pub fn invoke(&self, args: &[&str]) -> Result<String> {
        if !self.is_leaf() {
            return Err(DeviceError::NotALeafCommand {
                path: self.path.join(" "),
            });
        }
        let line = self.line(args);
        debug!(command = %line, "Invoking device command");
        self.shell.send(&line)
    }
}

/// Command tree built once from a [`CommandSpec`] and bound to one shell.
#[derive(Debug, Clone)]
pub struct CommandTree {
    commands: BTreeMap<String, CommandNode>,
    shell: Arc<Shell>,
}

impl CommandTree {
    #[must_use]
    pub fn build(spec: &CommandSpec, shell: Arc<Shell>) -> Self {
        let commands = spec
            .iter()
            .map(|(name, children)| {
                (
                    name.to_string(),
                    CommandNode::build(name, &[], children, &shell),
                )
            })
            .collect();
        Self { commands, shell }
    }

    #[must_use]
    pub const fn shell(&self) -> &Arc<Shell> {
        &self.shell
    }

    /// Look up a top-level command.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchCommand` if it is not declared.
    pub fn command(&self, name: &str) -> Result<&CommandNode> {
        self.commands
            .get(name)
            .ok_or_else(|| DeviceError::NoSuchCommand {
                command: name.to_string(),
            })
    }

    /// Descend the tree one name at a time.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchCommand` for an unknown or empty first name and
    /// `NoSuchSubCommand` for an unknown name deeper down.
    pub fn resolve(&self, path: &[&str]) -> Result<&CommandNode> {
        let (first, rest) = path.split_first().ok_or_else(|| DeviceError::NoSuchCommand {
            command: String::new(),
        })?;
        rest.iter()
            .try_fold(self.command(first)?, |node, name| node.subcommand(name))
    }

    /// Resolve `path` to a leaf and run it with `args`.
    ///
    /// # Errors
    ///
    /// Returns any resolution error, `NotALeafCommand`, or an error from the
    /// shell exchange.
    pub fn invoke(&self, path: &[&str], args: &[&str]) -> Result<String> {
        self.resolve(path)?.invoke(args)
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandNode> {
        self.commands.values()
    }

    /// Space-joined paths of every leaf, depth first in name order.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        fn collect(node: &CommandNode, out: &mut Vec<String>) {
            if node.is_leaf() {
                out.push(node.path.join(" "));
            }
            for child in node.children() {
                collect(child, out);
            }
        }

        let mut out = Vec::new();
        for node in self.commands.values() {
            collect(node, &mut out);
        }
        out
    }
}

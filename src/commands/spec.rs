use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{DeviceError, Result};

/// Validated command-tree declaration.
///
/// Each key maps either to `None` (a leaf) or to the declaration of its
/// subcommands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    entries: BTreeMap<String, Option<CommandSpec>>,
}

impl CommandSpec {
    /// Validate a raw declaration.
    ///
    /// A null value or an empty mapping declares a leaf.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming `commands.<path>` for any value that is
    /// neither null nor a mapping.
    pub fn from_value(raw: &Value) -> Result<Self> {
        match raw {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => Self::build(raw, &[]),
            _ => Err(DeviceError::ConfigInvalid {
                field: "commands".to_string(),
                reason: "expected a mapping of command name to subcommands".to_string(),
            }),
        }
    }

    fn build(raw: &Value, path: &[&str]) -> Result<Self> {
        let mut entries = BTreeMap::new();
        if let Value::Object(map) = raw {
            for (name, value) in map {
                let mut child_path = path.to_vec();
                child_path.push(name);
                let child = match value {
                    Value::Null => None,
                    Value::Object(map) if map.is_empty() => None,
                    Value::Object(_) => Some(Self::build(value, &child_path)?),
                    _ => {
                        return Err(DeviceError::ConfigInvalid {
                            field: format!("commands.{}", child_path.join(".")),
                            reason: "expected null or a mapping of subcommands".to_string(),
                        });
                    }
                };
                entries.insert(name.clone(), child);
            }
        }
        Ok(Self { entries })
    }

    /// Declare a command programmatically.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, children: Option<Self>) -> Self {
        self.entries.insert(name.into(), children);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Option<Self>> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Self>)> {
        self.entries
            .iter()
            .map(|(name, children)| (name.as_str(), children.as_ref()))
    }

    /// Space-joined paths of every declared leaf, in name order.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    fn collect_leaves(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, children) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix} {name}")
            };
            match children {
                Some(children) => children.collect_leaves(&path, out),
                None => out.push(path),
            }
        }
    }

    /// Number of top-level commands
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

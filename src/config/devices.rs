//! Device directory
//!
//! Resolves a device name to its connection parameters. Every record is
//! merged over the reserved `default` entry: fields present on the device
//! win, missing fields are inherited.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DeviceError, Result};

/// Name of the entry every other device inherits from.
pub const DEFAULT_ENTRY: &str = "default";

/// Alternative spellings accepted for record fields, with their canonical key.
const FIELD_ALIASES: [(&str, &str); 3] = [
    ("address", "ip"),
    ("baud", "baudrate"),
    ("baud_rate", "baudrate"),
];

/// Connection parameters for one device, after default inheritance.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceRecord {
    #[serde(default)]
    pub name: String,

    /// Management address used for SSH (`address` also accepted)
    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub ssh_port: Option<u16>,

    /// Serial device path, e.g. `/dev/ttyUSB0`
    #[serde(default)]
    pub serial_port: Option<String>,

    /// Serial speed (`baud` and `baud_rate` also accepted)
    #[serde(default)]
    pub baudrate: Option<u32>,

    /// Fields this crate does not interpret, kept for callers
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DeviceRecord {
    /// Fetch a field required by a connection kind.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming `devices.<name>.<field>` when absent.
    pub fn require<'a, T>(&'a self, field: &str, value: Option<&'a T>) -> Result<&'a T>
    where
        T: ?Sized,
    {
        value.ok_or_else(|| DeviceError::ConfigInvalid {
            field: format!("devices.{}.{field}", self.name),
            reason: "field is required for this connection type".to_string(),
        })
    }
}

/// Read-only mapping from device name to its resolved record.
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    devices: BTreeMap<String, DeviceRecord>,
}

impl DeviceDirectory {
    /// Build the directory from the raw declaration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the declaration is not a mapping, has no
    /// `default` entry, or a record is not a mapping of known field types.
    pub fn from_value(raw: Value) -> Result<Self> {
        let Value::Object(mut entries) = raw else {
            return Err(DeviceError::ConfigInvalid {
                field: "devices".to_string(),
                reason: "expected a mapping of device name to record".to_string(),
            });
        };

        let default = match entries.remove(DEFAULT_ENTRY) {
            Some(Value::Object(map)) => canonicalize(&format!("devices.{DEFAULT_ENTRY}"), map)?,
            Some(Value::Null) => Map::new(),
            Some(_) => {
                return Err(DeviceError::ConfigInvalid {
                    field: DEFAULT_ENTRY.to_string(),
                    reason: "expected a mapping".to_string(),
                });
            }
            None => {
                return Err(DeviceError::ConfigInvalid {
                    field: DEFAULT_ENTRY.to_string(),
                    reason: "a default entry must be defined".to_string(),
                });
            }
        };

        let mut devices = BTreeMap::new();
        for (name, record) in entries {
            let fields = match record {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                _ => {
                    return Err(DeviceError::ConfigInvalid {
                        field: format!("devices.{name}"),
                        reason: "expected a mapping".to_string(),
                    });
                }
            };
            let fields = canonicalize(&format!("devices.{name}"), fields)?;
            let record = resolve_record(&name, fields, &default)?;
            devices.insert(name, record);
        }

        debug!(count = devices.len(), "Device directory built");
        Ok(Self { devices })
    }

    /// Look up a device by name.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchDevice` if the name is not declared.
    pub fn get(&self, name: &str) -> Result<&DeviceRecord> {
        self.devices
            .get(name)
            .ok_or_else(|| DeviceError::NoSuchDevice {
                device: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn canonical_key(key: &str) -> &str {
    FIELD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map_or(key, |&(_, canonical)| canonical)
}

/// Rename aliased keys so the merge compares fields, not spellings.
fn canonicalize(scope: &str, fields: Map<String, Value>) -> Result<Map<String, Value>> {
    let mut canonical = Map::new();
    for (key, value) in fields {
        let name = canonical_key(&key).to_string();
        if canonical.contains_key(&name) {
            return Err(DeviceError::ConfigInvalid {
                field: format!("{scope}.{name}"),
                reason: format!("declared more than once (as `{key}` and an alias)"),
            });
        }
        canonical.insert(name, value);
    }
    Ok(canonical)
}

/// Merge `default` under `fields`; device values win on conflict.
fn merge_with_default(mut fields: Map<String, Value>, default: &Map<String, Value>) -> Map<String, Value> {
    for (key, value) in default {
        if !fields.contains_key(key) {
            fields.insert(key.clone(), value.clone());
        }
    }
    fields
}

fn resolve_record(
    name: &str,
    fields: Map<String, Value>,
    default: &Map<String, Value>,
) -> Result<DeviceRecord> {
    let mut merged = merge_with_default(fields, default);
    merged.insert("name".to_string(), Value::String(name.to_string()));
    serde_json::from_value(Value::Object(merged)).map_err(|e| DeviceError::ConfigInvalid {
        field: format!("devices.{name}"),
        reason: e.to_string(),
    })
}

mod devices;
mod loader;
mod types;

pub use devices::{DEFAULT_ENTRY, DeviceDirectory, DeviceRecord};
pub use loader::{load_commands, load_devices, load_settings};
pub use types::*;

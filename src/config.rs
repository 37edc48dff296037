//! Configuration loader, schema types and the persisted settings store.
//!
//! Settings are read once at startup; the few values the player mutates at
//! runtime (volume, loop, platform id) are written back through `SettingsStore`.

mod load;
mod schema;
mod store;

pub use load::{default_config_path, default_data_dir, resolve_config_path};
pub use schema::*;
pub use store::{SettingsError, SettingsStore};

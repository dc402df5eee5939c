//! Configuration for dylink
//!
//! Supports:
//! - `config.toml` - Global settings (target, payload, patch tool, behavior)
//! - `injection.toml` - Per-target injection options (the configuration store)

pub mod settings;
pub mod store;
pub mod types;

pub use settings::{
    config_dir, data_dir, init_config_dir, load_settings, CONFIG_FILENAME, DYLINK_HOME_ENV,
    STORE_FILENAME,
};
pub use store::{ConfigField, ConfigStore, MemoryConfigStore, TomlConfigStore};
pub use types::*;

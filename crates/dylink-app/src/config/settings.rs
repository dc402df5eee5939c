//! Settings file loading and dylink directory layout

use std::path::{Path, PathBuf};

use dylink_core::prelude::*;

use super::types::Settings;

/// Environment variable that relocates every dylink file
pub const DYLINK_HOME_ENV: &str = "DYLINK_HOME";

pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-target injection options, written by the configuration store
pub const STORE_FILENAME: &str = "injection.toml";

const APP_DIR_NAME: &str = "dylink";

// ─────────────────────────────────────────────────────────────────────────────
// Directory Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Directory holding `config.toml`
///
/// Priority: explicit override, then `$DYLINK_HOME`, then the platform config
/// directory (`~/.config/dylink` on Linux).
pub fn config_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    resolve_dir(override_dir, dirs::config_dir)
}

/// Directory holding the configuration store
///
/// Same overrides as [`config_dir`]; without one it is the platform data
/// directory, so option changes survive a wiped config directory.
pub fn data_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    resolve_dir(override_dir, dirs::data_dir)
}

fn resolve_dir(
    override_dir: Option<&Path>,
    platform_dir: fn() -> Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }

    if let Some(home) = std::env::var_os(DYLINK_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    platform_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| Error::config("Could not determine a directory for dylink files"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Load settings from `<dir>/config.toml`
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(dir: &Path) -> Settings {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create `<dir>/config.toml` with commented defaults
///
/// Idempotent: an existing file is left untouched. Returns the config path.
pub fn init_config_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::config(format!("Failed to create {:?}: {}", dir, e)))?;
        info!("Created config directory {:?}", dir);
    }

    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, generate_default_config())
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created default config.toml");
    }

    Ok(config_path)
}

fn generate_default_config() -> String {
    r#"# dylink configuration

[target]
bid = "com.dts.freefireth"      # Bundle identifier of the managed app

[payload]
name = "FIle.dylib"             # Library filename; identity is by name only
# bundled_dir = "/path/to/resources"   # Default: resources/ next to the dylink binary
# fallback_dir = "/path/to/Documents"  # Default: your Documents folder

[patcher]
command = "dylink-patch"        # Patch tool name (looked up on PATH) or absolute path
timeout_secs = 120

[behavior]
status_message_ttl_ms = 3000    # Success messages clear after this long
"#
    .to_string()
}

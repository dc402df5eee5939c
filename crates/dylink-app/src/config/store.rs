//! Per-target injection configuration store
//!
//! Holds the three patcher options for each bundle identifier. Only the
//! engine's event loop reads or writes a store; background operations work
//! on a snapshot taken when they were dispatched.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use dylink_core::prelude::*;
use dylink_core::{InjectStrategy, InjectionConfiguration};
use fs2::FileExt;

/// A single option change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    WeakReference(bool),
    PreferMainExecutable(bool),
    Strategy(InjectStrategy),
}

impl ConfigField {
    /// Keys accepted by [`ConfigField::parse`], in display order
    pub const KEYS: [&'static str; 3] =
        ["use_weak_reference", "prefer_main_executable", "strategy"];

    /// Parse a `key value` pair as typed on the command line
    ///
    /// Keys may use `-` or `_`; booleans accept true/false, on/off, yes/no, 1/0.
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        match key.trim().replace('-', "_").as_str() {
            "use_weak_reference" | "weak_reference" | "weak" => {
                Ok(ConfigField::WeakReference(parse_bool(key, value)?))
            }
            "prefer_main_executable" | "main_executable" => {
                Ok(ConfigField::PreferMainExecutable(parse_bool(key, value)?))
            }
            "strategy" | "inject_strategy" => Ok(ConfigField::Strategy(value.parse()?)),
            _ => Err(Error::config_invalid(format!(
                "Unknown option '{}' (expected one of: {})",
                key,
                Self::KEYS.join(", ")
            ))),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ConfigField::WeakReference(_) => "use_weak_reference",
            ConfigField::PreferMainExecutable(_) => "prefer_main_executable",
            ConfigField::Strategy(_) => "strategy",
        }
    }

    pub fn apply(&self, config: &mut InjectionConfiguration) {
        match *self {
            ConfigField::WeakReference(v) => config.use_weak_reference = v,
            ConfigField::PreferMainExecutable(v) => config.prefer_main_executable = v,
            ConfigField::Strategy(s) => config.strategy = s,
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigField::WeakReference(v) | ConfigField::PreferMainExecutable(v) => {
                write!(f, "{} = {}", self.key(), v)
            }
            ConfigField::Strategy(s) => write!(f, "{} = {}", self.key(), s),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(Error::config_invalid(format!(
            "Invalid value '{}' for {}: expected true or false",
            other, key
        ))),
    }
}

/// Key-value service for injection options, scoped by bundle identifier
pub trait ConfigStore: Send {
    /// Options for `bid`; defaults when nothing was stored yet
    fn get(&self, bid: &str) -> InjectionConfiguration;

    /// Persist one change immediately and return the updated options
    fn set(&mut self, bid: &str, field: ConfigField) -> Result<InjectionConfiguration>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Store that lives only as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    entries: HashMap<String, InjectionConfiguration>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, bid: &str) -> InjectionConfiguration {
        self.entries.get(bid).copied().unwrap_or_default()
    }

    fn set(&mut self, bid: &str, field: ConfigField) -> Result<InjectionConfiguration> {
        let config = self.entries.entry(bid.to_string()).or_default();
        field.apply(config);
        Ok(*config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TOML file store
// ─────────────────────────────────────────────────────────────────────────────

/// Store backed by `injection.toml`, one table per bundle identifier:
///
/// ```toml
/// ["com.dts.freefireth"]
/// use_weak_reference = true
/// prefer_main_executable = false
/// strategy = "lexicographic"
/// ```
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/injection.toml`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(super::settings::STORE_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw per-target tables; a missing file reads as empty.
    ///
    /// Entries are kept as TOML values so one invalid table never hides the
    /// others.
    fn read_tables(&self) -> Result<toml::Table> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(toml::Table::new()),
            Err(e) => {
                let message = format!("Failed to read {}: {}", self.path.display(), e);
                return Err(Error::config(message));
            }
        };

        toml::from_str(&content)
            .map_err(|e| Error::config(format!("Corrupt store {}: {}", self.path.display(), e)))
    }

    /// Decode one target's table; `None` when it is not valid options
    fn decode(bid: &str, value: &toml::Value) -> Option<InjectionConfiguration> {
        match value.clone().try_into() {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Ignoring invalid options for {}: {}", bid, e);
                None
            }
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = std::ffi::OsString::from(".");
        name.push(self.path.file_name().unwrap_or_default());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Atomic write: temp file, then rename
    fn write_all(&self, entries: &toml::Table) -> Result<()> {
        let content = toml::to_string_pretty(entries)
            .map_err(|e| Error::config(format!("Failed to serialize injection options: {}", e)))?;

        let temp_path = self.temp_path();
        let mut file = std::fs::File::create(&temp_path)
            .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;

        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, bid: &str) -> InjectionConfiguration {
        let tables = match self.read_tables() {
            Ok(tables) => tables,
            Err(e) => {
                warn!("{}; using defaults for {}", e, bid);
                return InjectionConfiguration::default();
            }
        };
        tables
            .get(bid)
            .and_then(|value| Self::decode(bid, value))
            .unwrap_or_default()
    }

    fn set(&mut self, bid: &str, field: ConfigField) -> Result<InjectionConfiguration> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::config(format!("Failed to create {:?}: {}", parent, e)))?;
        }

        // Exclusive lock covers the whole read-modify-write
        let lock = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| Error::config(format!("Failed to open store lock: {}", e)))?;
        lock.lock_exclusive()
            .map_err(|e| Error::config(format!("Failed to lock store: {}", e)))?;

        // An unreadable file is left alone rather than overwritten
        let mut tables = self.read_tables()?;
        let mut updated = tables
            .get(bid)
            .and_then(|value| Self::decode(bid, value))
            .unwrap_or_default();
        field.apply(&mut updated);

        let value = toml::Value::try_from(updated)
            .map_err(|e| Error::config(format!("Failed to serialize injection options: {}", e)))?;
        tables.insert(bid.to_string(), value);

        self.write_all(&tables)?;
        info!("Saved {} for {} to {:?}", field, bid, self.path);

        // Lock is released when `lock` is dropped
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BID: &str = "com.dts.freefireth";

    #[test]
    fn test_parse_fields() {
        assert_eq!(
            ConfigField::parse("use-weak-reference", "off").unwrap(),
            ConfigField::WeakReference(false)
        );
        assert_eq!(
            ConfigField::parse("prefer_main_executable", "YES").unwrap(),
            ConfigField::PreferMainExecutable(true)
        );
        assert_eq!(
            ConfigField::parse("strategy", "postorder").unwrap(),
            ConfigField::Strategy(InjectStrategy::Postorder)
        );
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        assert!(matches!(
            ConfigField::parse("strategy", "random"),
            Err(Error::ConfigInvalid { .. })
        ));
        assert!(matches!(
            ConfigField::parse("use_weak_reference", "maybe"),
            Err(Error::ConfigInvalid { .. })
        ));
        assert!(matches!(
            ConfigField::parse("colour", "red"),
            Err(Error::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_memory_store_defaults_and_updates() {
        let mut store = MemoryConfigStore::new();
        assert_eq!(store.get(BID), InjectionConfiguration::default());

        store.set(BID, ConfigField::PreferMainExecutable(true)).unwrap();
        assert!(store.get(BID).prefer_main_executable);
        // scoped per target
        assert!(!store.get("com.other.app").prefer_main_executable);
    }

    #[test]
    fn test_toml_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let mut store = TomlConfigStore::in_dir(dir.path());

        store.set(BID, ConfigField::WeakReference(false)).unwrap();
        store
            .set(BID, ConfigField::Strategy(InjectStrategy::Fast))
            .unwrap();

        let reopened = TomlConfigStore::in_dir(dir.path());
        let config = reopened.get(BID);
        assert!(!config.use_weak_reference);
        assert!(!config.prefer_main_executable);
        assert_eq!(config.strategy, InjectStrategy::Fast);
        assert_eq!(
            reopened.get("com.other.app"),
            InjectionConfiguration::default()
        );
    }

    #[test]
    fn test_toml_store_file_layout() {
        let dir = TempDir::new().unwrap();
        let mut store = TomlConfigStore::in_dir(dir.path());
        store
            .set(BID, ConfigField::Strategy(InjectStrategy::Preorder))
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("[\"com.dts.freefireth\"]"));
        assert!(content.contains("strategy = \"preorder\""));
        assert!(!dir.path().join(".injection.toml.tmp").exists());
    }

    #[test]
    fn test_toml_store_corrupt_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let mut store = TomlConfigStore::in_dir(dir.path());
        std::fs::write(store.path(), "not = [valid").unwrap();

        assert_eq!(store.get(BID), InjectionConfiguration::default());

        let result = store.set(BID, ConfigField::WeakReference(false));
        assert!(matches!(result, Err(Error::Config { .. })));
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "not = [valid"
        );
    }

    #[test]
    fn test_toml_store_invalid_entry_spares_other_targets() {
        let dir = TempDir::new().unwrap();
        let mut store = TomlConfigStore::in_dir(dir.path());
        store.set("com.a", ConfigField::WeakReference(false)).unwrap();

        let mut content = std::fs::read_to_string(store.path()).unwrap();
        content.push_str("\n[\"com.b\"]\nstrategy = \"random\"\n");
        std::fs::write(store.path(), content).unwrap();

        assert_eq!(store.get("com.b"), InjectionConfiguration::default());
        assert!(!store.get("com.a").use_weak_reference);

        store
            .set("com.c", ConfigField::Strategy(InjectStrategy::Fast))
            .unwrap();

        let reopened = TomlConfigStore::in_dir(dir.path());
        assert!(!reopened.get("com.a").use_weak_reference);
        assert_eq!(reopened.get("com.c").strategy, InjectStrategy::Fast);
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("strategy = \"random\""));
    }
}

//! Installed-application catalog and target resolution

use std::path::Path;

use dylink_core::prelude::*;
use dylink_core::Application;
use serde::{Deserialize, Serialize};

/// Read-only list of installed applications, supplied from outside
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(default, alias = "apps")]
    pub applications: Vec<Application>,
}

/// JSON catalogs may be a bare array or an object with an `applications` list
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCatalog {
    List(Vec<Application>),
    Object(Catalog),
}

impl Catalog {
    pub fn new(applications: Vec<Application>) -> Self {
        Self { applications }
    }

    /// Find the application with identifier `bid`
    ///
    /// Not finding it is a normal outcome: the app simply isn't installed.
    pub fn resolve(&self, bid: &str) -> Option<&Application> {
        self.applications.iter().find(|app| app.bid == bid)
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

/// Load a catalog from a `.json` or `.toml` file
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::catalog(format!("Failed to read {}: {}", path.display(), e)))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let catalog = match extension.as_deref() {
        Some("json") => match serde_json::from_str::<JsonCatalog>(&content) {
            Ok(JsonCatalog::List(applications)) => Catalog::new(applications),
            Ok(JsonCatalog::Object(catalog)) => catalog,
            Err(e) => {
                return Err(Error::catalog(format!(
                    "Invalid catalog {}: {}",
                    path.display(),
                    e
                )))
            }
        },
        Some("toml") => toml::from_str(&content).map_err(|e| {
            Error::catalog(format!("Invalid catalog {}: {}", path.display(), e))
        })?,
        _ => {
            return Err(Error::catalog(format!(
                "Unsupported catalog format {} (expected .json or .toml)",
                path.display()
            )))
        }
    };

    debug!("Loaded {} application(s) from {:?}", catalog.len(), path);
    Ok(catalog)
}

//! Locating the library file to attach

use std::path::{Path, PathBuf};

use dylink_core::prelude::*;

use crate::config::PayloadSettings;

/// Finds the payload file by name
#[cfg_attr(test, mockall::automock)]
pub trait PayloadLocator: Send + Sync {
    /// Full path of `file_name`, or `None` when no location has it
    fn locate(&self, file_name: &str) -> Option<PathBuf>;
}

/// Looks in the bundled resources directory first, then the writable fallback
#[derive(Debug, Clone, Default)]
pub struct FsPayloadLocator {
    bundled_dir: Option<PathBuf>,
    fallback_dir: Option<PathBuf>,
}

impl FsPayloadLocator {
    pub fn new(bundled_dir: Option<PathBuf>, fallback_dir: Option<PathBuf>) -> Self {
        Self {
            bundled_dir,
            fallback_dir,
        }
    }

    /// Directories from settings, defaulting to `resources/` beside the
    /// executable and the user's Documents folder
    pub fn from_settings(settings: &PayloadSettings) -> Self {
        let bundled_dir = settings.bundled_dir.clone().or_else(default_bundled_dir);
        let fallback_dir = settings.fallback_dir.clone().or_else(dirs::document_dir);
        Self::new(bundled_dir, fallback_dir)
    }

    /// Directories searched, in order
    pub fn search_dirs(&self) -> impl Iterator<Item = &Path> {
        self.bundled_dir
            .iter()
            .chain(self.fallback_dir.iter())
            .map(PathBuf::as_path)
    }
}

fn default_bundled_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("resources"))
}

impl PayloadLocator for FsPayloadLocator {
    fn locate(&self, file_name: &str) -> Option<PathBuf> {
        for dir in self.search_dirs() {
            let candidate = dir.join(file_name);
            if candidate.is_file() {
                debug!("Found payload at {:?}", candidate);
                return Some(candidate);
            }
        }

        warn!("Payload {} not found in {:?}", file_name, self.search_dirs().collect::<Vec<_>>());
        None
    }
}

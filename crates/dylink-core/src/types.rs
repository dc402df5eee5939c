//! Core domain types for dylink

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Library filename managed by a default deployment
pub const DEFAULT_ATTACHMENT_NAME: &str = "FIle.dylib";

// ─────────────────────────────────────────────────────────────────────────────
// Application
// ─────────────────────────────────────────────────────────────────────────────

/// Side-channel for asking the catalog owner to refresh an application's
/// presentation state (icon, metadata) after its binary changed.
///
/// Clones share the same counter, so the catalog can observe requests made
/// through any copy handed out to an orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ReloadHandle {
    generation: Arc<AtomicU64>,
}

impl ReloadHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a refresh; returns the new generation
    pub fn request_reload(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of reloads requested so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// An installed application, as listed by the external app catalog
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Application {
    /// Stable bundle identifier (e.g. "com.dts.freefireth")
    pub bid: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Location of the `.app` bundle on disk
    #[serde(alias = "url", alias = "path")]
    pub bundle_path: PathBuf,

    /// Short version string, when known
    #[serde(default)]
    pub version: Option<String>,

    /// Signing team identifier
    #[serde(default, alias = "teamID")]
    pub team_id: String,

    #[serde(skip)]
    pub reload: ReloadHandle,
}

impl Application {
    pub fn new(bid: impl Into<String>, bundle_path: impl Into<PathBuf>) -> Self {
        let bid = bid.into();
        Self {
            name: bid.clone(),
            bid,
            bundle_path: bundle_path.into(),
            version: None,
            team_id: String::new(),
            reload: ReloadHandle::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = team_id.into();
        self
    }

    /// Name to show the user, falling back to the identifier
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.bid
        } else {
            &self.name
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Attachment Target
// ─────────────────────────────────────────────────────────────────────────────

/// The shared library this deployment manages, identified by filename only.
///
/// Any attached library whose final path segment equals the filename is
/// considered the managed attachment, wherever it sits in the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentTarget {
    file_name: String,
}

impl AttachmentTarget {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Whether `path` names the managed library
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| name == OsStr::new(&self.file_name))
            .unwrap_or(false)
    }

    /// Keep only the entries naming the managed library
    pub fn filter<'a, I>(&self, paths: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        paths
            .into_iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect()
    }
}

impl Default for AttachmentTarget {
    fn default() -> Self {
        Self::new(DEFAULT_ATTACHMENT_NAME)
    }
}

impl fmt::Display for AttachmentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Injection Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Order in which the patcher considers candidate Mach-O binaries in the
/// bundle when choosing where to add the load command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectStrategy {
    /// Candidates sorted by bundle-relative path; first eligible binary wins
    #[default]
    Lexicographic,
    /// Smallest eligible binary first, minimizing bytes rewritten and re-signed
    Fast,
    /// Dependency tree walked parents-first, starting from the main executable
    Preorder,
    /// Dependency tree walked leaves-first
    Postorder,
}

impl InjectStrategy {
    pub const ALL: [InjectStrategy; 4] = [
        InjectStrategy::Lexicographic,
        InjectStrategy::Fast,
        InjectStrategy::Preorder,
        InjectStrategy::Postorder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InjectStrategy::Lexicographic => "lexicographic",
            InjectStrategy::Fast => "fast",
            InjectStrategy::Preorder => "preorder",
            InjectStrategy::Postorder => "postorder",
        }
    }
}

impl fmt::Display for InjectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InjectStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        InjectStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| {
                crate::Error::config_invalid(format!(
                    "unknown inject strategy '{}' (expected one of: lexicographic, fast, preorder, postorder)",
                    s
                ))
            })
    }
}

/// Per-target patching options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct InjectionConfiguration {
    /// Add the load command as weak (`LC_LOAD_WEAK_DYLIB`)
    #[serde(default = "default_true")]
    pub use_weak_reference: bool,

    /// Prefer the main executable over embedded frameworks
    #[serde(default)]
    pub prefer_main_executable: bool,

    #[serde(default)]
    pub strategy: InjectStrategy,
}

impl Default for InjectionConfiguration {
    fn default() -> Self {
        Self {
            use_weak_reference: true,
            prefer_main_executable: false,
            strategy: InjectStrategy::Lexicographic,
        }
    }
}

fn default_true() -> bool {
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Attachment Status
// ─────────────────────────────────────────────────────────────────────────────

/// Whether the managed library is referenced by the bundle right now.
///
/// Always derived from a fresh inspection; an inspection that could not be
/// completed reads as `NotAttached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    Attached,
    #[default]
    NotAttached,
}

impl AttachmentStatus {
    pub fn from_attached(attached: bool) -> Self {
        if attached {
            AttachmentStatus::Attached
        } else {
            AttachmentStatus::NotAttached
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, AttachmentStatus::Attached)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttachmentStatus::Attached => "Injected",
            AttachmentStatus::NotAttached => "Not Injected",
        }
    }
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//! Binary patcher contract
//!
//! The patcher owns everything about the executable's format: finding the
//! Mach-O binaries inside a bundle, rewriting their load commands, and
//! re-signing them. Orchestration code only ever talks to it through these
//! traits.

use std::path::{Path, PathBuf};

use dylink_core::prelude::*;
use dylink_core::{InjectStrategy, InjectionConfiguration};

/// A patcher bound to one application bundle.
///
/// Identity fields may start out empty when the patcher could not read them
/// from the bundle; callers backfill them before mutating.
#[trait_variant::make(BinaryPatcher: Send)]
pub trait LocalBinaryPatcher {
    /// Bundle identifier the patcher will sign for
    fn app_id(&self) -> &str;
    fn set_app_id(&mut self, app_id: String);

    /// Signing team identifier
    fn team_id(&self) -> &str;
    fn set_team_id(&mut self, team_id: String);

    fn set_use_weak_reference(&mut self, enabled: bool);
    fn set_prefer_main_executable(&mut self, enabled: bool);
    fn set_strategy(&mut self, strategy: InjectStrategy);

    /// Locations of every library currently attached to `bundle`.
    ///
    /// Read-only; never modifies the bundle.
    async fn attached_libraries(&self, bundle: &Path) -> Result<Vec<PathBuf>>;

    /// Attach `payloads`; `persist` keeps them across relaunches
    async fn attach(&mut self, payloads: &[PathBuf], persist: bool) -> Result<()>;

    /// Detach `payloads`; `persist` keeps the removal across relaunches
    async fn detach(&mut self, payloads: &[PathBuf], persist: bool) -> Result<()>;
}

/// Apply all three configuration values to a patcher
pub fn apply_configuration<P: BinaryPatcher>(
    patcher: &mut P,
    config: &InjectionConfiguration,
) {
    patcher.set_use_weak_reference(config.use_weak_reference);
    patcher.set_prefer_main_executable(config.prefer_main_executable);
    patcher.set_strategy(config.strategy);
}

/// Constructs patchers for bundles.
///
/// Construction fails for unreadable bundles or unsupported binary layouts.
pub trait PatcherFactory: Send + Sync + 'static {
    type Patcher: BinaryPatcher + Sync + 'static;

    fn open(&self, bundle: &Path) -> Result<Self::Patcher>;
}

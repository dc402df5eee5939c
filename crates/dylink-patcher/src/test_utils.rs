//! Test utilities for patcher consumers
//!
//! Provides an in-memory patcher that simulates a bundle's attachment
//! manifest and records every call made against it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use dylink_core::prelude::*;
use dylink_core::{InjectStrategy, InjectionConfiguration};
use tokio::sync::{Notify, Semaphore};

use crate::patcher::{BinaryPatcher, PatcherFactory};

/// One recorded attach or detach call, with the patcher's settings at call time
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub payloads: Vec<PathBuf>,
    pub persist: bool,
    pub app_id: String,
    pub team_id: String,
    pub options: InjectionConfiguration,
}

/// Simulated bundle state shared between a factory and its patchers
#[derive(Debug, Default)]
pub struct FakeBundle {
    /// Libraries the bundle currently references
    pub attached: Vec<PathBuf>,

    /// Identity the patcher reads from the bundle (empty = unreadable)
    pub app_id: String,
    pub team_id: String,

    pub open_count: usize,
    pub list_count: usize,
    pub attach_calls: Vec<RecordedCall>,
    pub detach_calls: Vec<RecordedCall>,

    /// Make `open` fail with this reason
    pub fail_open: Option<String>,
    /// Make `attached_libraries` fail with this message
    pub fail_list: Option<String>,
    /// Make `attach` fail with this message
    pub fail_attach: Option<String>,
    /// Make `detach` fail with this message
    pub fail_detach: Option<String>,

    /// Report attach success without touching the manifest
    pub attach_is_silent: bool,
}

/// Factory handing out [`FakePatcher`]s over one shared [`FakeBundle`]
#[derive(Debug, Clone, Default)]
pub struct FakePatcherFactory {
    bundle: Arc<Mutex<FakeBundle>>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl FakePatcherFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `paths` already attached
    pub fn with_attached(paths: &[&str]) -> Self {
        let factory = Self::new();
        factory.state().attached = paths.iter().map(PathBuf::from).collect();
        factory
    }

    /// Hold every attach/detach until [`FakePatcherFactory::release`] is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one gated attach/detach proceed
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Wait until an attach/detach call has started
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn state(&self) -> MutexGuard<'_, FakeBundle> {
        self.bundle.lock().unwrap()
    }

    pub fn open_count(&self) -> usize {
        self.state().open_count
    }

    pub fn attached(&self) -> Vec<PathBuf> {
        self.state().attached.clone()
    }
}

impl PatcherFactory for FakePatcherFactory {
    type Patcher = FakePatcher;

    fn open(&self, bundle: &Path) -> Result<FakePatcher> {
        let mut state = self.state();
        state.open_count += 1;
        if let Some(reason) = &state.fail_open {
            return Err(Error::patcher_unavailable(bundle, reason.clone()));
        }

        Ok(FakePatcher {
            bundle_path: bundle.to_path_buf(),
            app_id: state.app_id.clone(),
            team_id: state.team_id.clone(),
            options: InjectionConfiguration::default(),
            shared: self.bundle.clone(),
            gate: self.gate.clone(),
            entered: self.entered.clone(),
        })
    }
}

/// In-memory patcher; attach adds `<bundle>/Frameworks/<name>` entries
#[derive(Debug)]
pub struct FakePatcher {
    bundle_path: PathBuf,
    app_id: String,
    team_id: String,
    options: InjectionConfiguration,
    shared: Arc<Mutex<FakeBundle>>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl FakePatcher {
    fn record(&self, payloads: &[PathBuf], persist: bool) -> RecordedCall {
        RecordedCall {
            payloads: payloads.to_vec(),
            persist,
            app_id: self.app_id.clone(),
            team_id: self.team_id.clone(),
            options: self.options,
        }
    }

    async fn pass_gate(&self) {
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

impl BinaryPatcher for FakePatcher {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    fn set_app_id(&mut self, app_id: String) {
        self.app_id = app_id;
    }

    fn team_id(&self) -> &str {
        &self.team_id
    }

    fn set_team_id(&mut self, team_id: String) {
        self.team_id = team_id;
    }

    fn set_use_weak_reference(&mut self, enabled: bool) {
        self.options.use_weak_reference = enabled;
    }

    fn set_prefer_main_executable(&mut self, enabled: bool) {
        self.options.prefer_main_executable = enabled;
    }

    fn set_strategy(&mut self, strategy: InjectStrategy) {
        self.options.strategy = strategy;
    }

    async fn attached_libraries(&self, _bundle: &Path) -> Result<Vec<PathBuf>> {
        let mut state = self.shared.lock().unwrap();
        state.list_count += 1;
        if let Some(message) = &state.fail_list {
            return Err(Error::patch(message.clone()));
        }
        Ok(state.attached.clone())
    }

    async fn attach(&mut self, payloads: &[PathBuf], persist: bool) -> Result<()> {
        self.pass_gate().await;

        let call = self.record(payloads, persist);
        let mut state = self.shared.lock().unwrap();
        state.attach_calls.push(call);
        if let Some(message) = &state.fail_attach {
            return Err(Error::patch(message.clone()));
        }
        if state.attach_is_silent {
            return Ok(());
        }

        for payload in payloads {
            let Some(name) = payload.file_name() else {
                continue;
            };
            let installed = self.bundle_path.join("Frameworks").join(name);
            if !state.attached.contains(&installed) {
                state.attached.push(installed);
            }
        }
        Ok(())
    }

    async fn detach(&mut self, payloads: &[PathBuf], persist: bool) -> Result<()> {
        self.pass_gate().await;

        let call = self.record(payloads, persist);
        let mut state = self.shared.lock().unwrap();
        state.detach_calls.push(call);
        if let Some(message) = &state.fail_detach {
            return Err(Error::patch(message.clone()));
        }

        state.attached.retain(|p| !payloads.contains(p));
        Ok(())
    }
}

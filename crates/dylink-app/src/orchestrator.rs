//! Attach and detach orchestration
//!
//! Each run walks the phase machine recorded in its [`OperationReport`]:
//!
//! ```text
//! attach: Idle → Resolving → Configuring → Attaching → Verifying → Succeeded | Failed
//! detach: Idle → Resolving → Configuring → Locating → [Detaching] → Verifying → Succeeded | Failed
//! ```
//!
//! Runs never return errors. Every failure is folded into the report, and
//! once the patcher has been involved the bundle is always re-inspected so
//! the reported status matches what is on disk.

use std::path::Path;
use std::sync::Arc;

use dylink_core::prelude::*;
use dylink_core::{
    Application, AttachmentTarget, InjectionConfiguration, OperationKind, OperationOutcome,
    OperationPhase, OperationReport,
};
use dylink_patcher::{apply_configuration, BinaryPatcher, PatcherFactory};

use crate::catalog::Catalog;
use crate::inspector::{inspect_status, inspect_target};
use crate::payload::PayloadLocator;
use crate::single_flight::SingleFlight;

/// Everything an operation needs besides its configuration snapshot
///
/// Shared between the engine and its background tasks behind an `Arc`.
pub struct OperationContext<F: PatcherFactory> {
    pub factory: F,
    pub catalog: Catalog,
    pub locator: Arc<dyn PayloadLocator>,
    pub target: AttachmentTarget,
    pub flights: SingleFlight,
}

impl<F: PatcherFactory> OperationContext<F> {
    pub fn new(
        factory: F,
        catalog: Catalog,
        locator: Arc<dyn PayloadLocator>,
        target: AttachmentTarget,
    ) -> Self {
        Self {
            factory,
            catalog,
            locator,
            target,
            flights: SingleFlight::new(),
        }
    }

    /// Current status of `bid`; `None` when it is not installed
    pub async fn inspect(&self, bid: &str) -> Option<dylink_core::AttachmentStatus> {
        inspect_target(&self.catalog, &self.factory, bid, &self.target).await
    }

    pub async fn run(
        &self,
        kind: OperationKind,
        bid: &str,
        config: InjectionConfiguration,
    ) -> OperationReport {
        match kind {
            OperationKind::Attach => self.run_attach(bid, config).await,
            OperationKind::Detach => self.run_detach(bid, config).await,
        }
    }

    /// Attach the payload to `bid`'s bundle
    ///
    /// Does not look at the current status first; attaching an already
    /// attached library is left to the patcher.
    pub async fn run_attach(&self, bid: &str, config: InjectionConfiguration) -> OperationReport {
        let mut report = OperationReport::new(OperationKind::Attach, bid);

        let Some(_flight) = self.flights.try_acquire(bid) else {
            warn!("Attach rejected: {} already has an operation in flight", bid);
            report.outcome = OperationOutcome::Busy;
            return report;
        };

        report.enter(OperationPhase::Resolving);
        let Some(app) = self.catalog.resolve(bid) else {
            info!("{} is not installed; attach not applicable", bid);
            return report;
        };

        // Checked before any patcher exists
        let Some(payload) = self.locator.locate(self.target.file_name()) else {
            let err = Error::payload_missing(self.target.file_name());
            error!("Attach failed: {}", err);
            report.enter(OperationPhase::Failed);
            report.outcome = OperationOutcome::Failure(err.into());
            return report;
        };

        report.enter(OperationPhase::Configuring);
        let result = self
            .attach_payload(app, &payload, &config, &mut report)
            .await;
        self.verify(app, result, &mut report).await;
        report
    }

    /// Remove every attached library named like the payload from `bid`'s bundle
    ///
    /// The payload file itself does not need to exist.
    pub async fn run_detach(&self, bid: &str, config: InjectionConfiguration) -> OperationReport {
        let mut report = OperationReport::new(OperationKind::Detach, bid);

        let Some(_flight) = self.flights.try_acquire(bid) else {
            warn!("Detach rejected: {} already has an operation in flight", bid);
            report.outcome = OperationOutcome::Busy;
            return report;
        };

        report.enter(OperationPhase::Resolving);
        let Some(app) = self.catalog.resolve(bid) else {
            info!("{} is not installed; detach not applicable", bid);
            return report;
        };

        report.enter(OperationPhase::Configuring);
        let result = self.detach_managed(app, &config, &mut report).await;
        self.verify(app, result, &mut report).await;
        report
    }

    /// Open a patcher for the app, backfill identity, apply options
    fn open_configured(
        &self,
        app: &Application,
        config: &InjectionConfiguration,
    ) -> Result<F::Patcher> {
        let mut patcher = self.factory.open(&app.bundle_path)?;

        if patcher.app_id().is_empty() {
            patcher.set_app_id(app.bid.clone());
        }
        if patcher.team_id().is_empty() {
            patcher.set_team_id(app.team_id.clone());
        }
        apply_configuration(&mut patcher, config);

        Ok(patcher)
    }

    async fn attach_payload(
        &self,
        app: &Application,
        payload: &Path,
        config: &InjectionConfiguration,
        report: &mut OperationReport,
    ) -> Result<()> {
        let mut patcher = self.open_configured(app, config)?;
        report.applied = Some(*config);

        report.enter(OperationPhase::Attaching);
        patcher.attach(&[payload.to_path_buf()], true).await
    }

    async fn detach_managed(
        &self,
        app: &Application,
        config: &InjectionConfiguration,
        report: &mut OperationReport,
    ) -> Result<()> {
        let mut patcher = self.open_configured(app, config)?;
        report.applied = Some(*config);

        report.enter(OperationPhase::Locating);
        let attached = patcher.attached_libraries(&app.bundle_path).await?;
        let managed = self.target.filter(&attached);
        if managed.is_empty() {
            info!("{} is not attached to {}; nothing to detach", self.target, app.bid);
            return Ok(());
        }

        report.enter(OperationPhase::Detaching);
        patcher.detach(&managed, true).await
    }

    /// Re-inspect the bundle and settle the outcome
    async fn verify(&self, app: &Application, result: Result<()>, report: &mut OperationReport) {
        report.enter(OperationPhase::Verifying);
        let status = inspect_status(&self.factory, &app.bundle_path, &self.target).await;
        report.status = Some(status);

        match result {
            Ok(()) => {
                let expected = report.kind == OperationKind::Attach;
                if status.is_attached() != expected {
                    warn!(
                        "{} of {} reported success but bundle reads {}",
                        report.kind, app.bid, status
                    );
                }
                let generation = app.reload.request_reload();
                debug!("Requested reload #{} for {}", generation, app.bid);

                report.enter(OperationPhase::Succeeded);
                report.outcome = OperationOutcome::Success;
            }
            Err(e) => {
                error!("{} of {} failed: {}", report.kind, app.bid, e);
                report.enter(OperationPhase::Failed);
                report.outcome = OperationOutcome::Failure(e.into());
            }
        }
    }
}

//! Engine - the interactive context
//!
//! The Engine owns the TEA state, the message channel, the configuration
//! store, and the shared operation context. Every caller-visible state
//! change happens inside [`Engine::process_message`]; background tasks only
//! send messages back.

use std::sync::Arc;

use dylink_core::prelude::*;
use dylink_core::{AttachmentTarget, InjectionConfiguration, OperationKind};
use dylink_patcher::PatcherFactory;
use tokio::sync::{broadcast, mpsc};

use crate::catalog::Catalog;
use crate::config::{ConfigStore, Settings};
use crate::engine_event::EngineEvent;
use crate::message::Message;
use crate::orchestrator::OperationContext;
use crate::payload::PayloadLocator;
use crate::process;
use crate::state::AppState;

/// Lightweight snapshot of state for change detection.
///
/// Captured before message processing, compared after to detect
/// what changed and emit appropriate EngineEvents.
#[derive(Debug, Clone, PartialEq)]
struct StateSnapshot {
    status_revision: u64,
    in_flight: Option<OperationKind>,
    message: Option<String>,
    errors_raised: u64,
    config: InjectionConfiguration,
    completed_operations: u64,
}

impl StateSnapshot {
    fn capture(state: &AppState) -> Self {
        Self {
            status_revision: state.status_revision,
            in_flight: state.in_flight,
            message: state.reporter.text().map(String::from),
            errors_raised: state.reporter.errors_raised(),
            config: state.config,
            completed_operations: state.completed_operations,
        }
    }
}

/// Orchestration engine for dylink.
pub struct Engine<F: PatcherFactory> {
    /// TEA application state (the Model)
    pub state: AppState,

    /// Sender half of the message channel. Clone this for input sources.
    pub msg_tx: mpsc::Sender<Message>,

    /// Receiver half of the message channel, drained by the runner.
    pub msg_rx: mpsc::Receiver<Message>,

    /// Loaded settings
    pub settings: Settings,

    /// Injection options; only touched on the event loop
    store: Box<dyn ConfigStore>,

    /// Shared with background operation tasks
    context: Arc<OperationContext<F>>,

    /// Event broadcaster for external consumers
    event_tx: broadcast::Sender<EngineEvent>,
}

impl<F: PatcherFactory> Engine<F> {
    /// Create an engine managing `settings.target.bid`.
    pub fn new(
        settings: Settings,
        catalog: Catalog,
        factory: F,
        locator: Arc<dyn PayloadLocator>,
        store: Box<dyn ConfigStore>,
    ) -> Self {
        let bid = settings.target.bid.clone();
        let target = AttachmentTarget::new(settings.payload.name.clone());

        let application = catalog.resolve(&bid).cloned();
        match &application {
            Some(app) => info!("Managing {} for {} at {:?}", target, bid, app.bundle_path),
            None => info!("{} is not installed", bid),
        }

        let mut state = AppState::new(bid.clone())
            .with_application(application)
            .with_status_message_ttl(settings.behavior.status_message_ttl());
        state.config = store.get(&bid);

        let (msg_tx, msg_rx) = mpsc::channel::<Message>(256);
        let (event_tx, _) = broadcast::channel(256);

        let context = Arc::new(OperationContext::new(factory, catalog, locator, target));

        Self {
            state,
            msg_tx,
            msg_rx,
            settings,
            store,
            context,
            event_tx,
        }
    }

    /// Subscribe to engine events.
    ///
    /// If the subscriber falls behind (buffer full), older events are dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Process a single message through the TEA update cycle.
    pub fn process_message(&mut self, msg: Message) {
        let pre = StateSnapshot::capture(&self.state);

        process::process_message(
            &mut self.state,
            msg,
            &self.msg_tx,
            self.store.as_mut(),
            &self.context,
        );

        let post = StateSnapshot::capture(&self.state);
        if pre != post {
            self.emit_events(&pre, &post);
        }
    }

    /// Drain and process all pending messages from the channel.
    ///
    /// Returns the number of messages processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    /// Wait for the next message and process it
    pub async fn process_next(&mut self) -> bool {
        match self.msg_rx.recv().await {
            Some(msg) => {
                self.process_message(msg);
                true
            }
            None => false,
        }
    }

    /// Process messages until no operation or inspection is outstanding.
    ///
    /// Pending status-message expiries are not waited for.
    pub async fn run_until_settled(&mut self) {
        loop {
            self.drain_pending_messages();
            if self.state.is_settled() {
                return;
            }
            if !self.process_next().await {
                return;
            }
        }
    }

    /// Shared operation context (catalog, patcher factory, single-flight registry)
    pub fn context(&self) -> &Arc<OperationContext<F>> {
        &self.context
    }

    /// Current injection options for the managed target, read from the store
    pub fn config(&self) -> InjectionConfiguration {
        self.store.get(&self.state.bid)
    }

    pub fn shutdown(&mut self) {
        self.emit(EngineEvent::Shutdown);
    }

    /// Emit EngineEvents for everything that changed during one cycle
    fn emit_events(&self, pre: &StateSnapshot, post: &StateSnapshot) {
        let bid = &self.state.bid;

        if let Some(kind) = post.in_flight {
            if pre.in_flight != post.in_flight {
                self.emit(EngineEvent::OperationStarted {
                    kind,
                    bid: bid.clone(),
                });
            }
        }

        if post.completed_operations != pre.completed_operations {
            if let Some(report) = &self.state.last_report {
                self.emit(EngineEvent::OperationFinished {
                    report: report.clone(),
                });
            }
        }

        if post.status_revision != pre.status_revision {
            self.emit(EngineEvent::StatusReported {
                bid: bid.clone(),
                status: self.state.status,
            });
        }

        if post.message != pre.message {
            self.emit(EngineEvent::StatusMessage {
                text: post.message.clone(),
            });
        }

        if post.errors_raised != pre.errors_raised {
            if let Some(message) = self.state.reporter.last_error() {
                self.emit(EngineEvent::ErrorRaised {
                    message: message.to_string(),
                });
            }
        }

        if post.config != pre.config {
            self.emit(EngineEvent::ConfigChanged {
                bid: bid.clone(),
                config: post.config,
            });
        }
    }

    /// Emit a single EngineEvent to all subscribers.
    ///
    /// send() returns Err only if there are no receivers.
    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigField, MemoryConfigStore};
    use crate::payload::MockPayloadLocator;
    use crate::reporter::{BUSY_MESSAGE, PAYLOAD_MISSING_MESSAGE};
    use dylink_core::{
        Application, AttachmentStatus, InjectStrategy, OperationOutcome, OperationPhase,
    };
    use dylink_patcher::test_utils::FakePatcherFactory;
    use std::path::PathBuf;
    use std::time::Duration;

    const BID: &str = "com.dts.freefireth";
    const BUNDLE: &str = "/Apps/FreeFire.app";

    fn installed() -> Catalog {
        Catalog::new(vec![Application::new(BID, BUNDLE).with_name("Free Fire")])
    }

    fn payload_found() -> Arc<dyn PayloadLocator> {
        let mut locator = MockPayloadLocator::new();
        locator
            .expect_locate()
            .returning(|name| Some(PathBuf::from("/payloads").join(name)));
        Arc::new(locator)
    }

    fn engine_with(
        catalog: Catalog,
        factory: &FakePatcherFactory,
        locator: Arc<dyn PayloadLocator>,
    ) -> Engine<FakePatcherFactory> {
        Engine::new(
            Settings::default(),
            catalog,
            factory.clone(),
            locator,
            Box::new(MemoryConfigStore::new()),
        )
    }

    fn drain_events(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_engine_new_reads_catalog_and_store() {
        let factory = FakePatcherFactory::new();
        let engine = engine_with(installed(), &factory, payload_found());

        assert!(engine.state.is_installed());
        assert_eq!(engine.state.bid, BID);
        assert_eq!(engine.state.config, InjectionConfiguration::default());
        assert!(engine.state.status.is_none());
        assert_eq!(factory.open_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_status_reports_attached() {
        let factory =
            FakePatcherFactory::with_attached(&["/Apps/FreeFire.app/Frameworks/FIle.dylib"]);
        let mut engine = engine_with(installed(), &factory, payload_found());
        let mut rx = engine.subscribe();

        engine.process_message(Message::RefreshStatus);
        engine.run_until_settled().await;

        assert_eq!(engine.state.status, Some(AttachmentStatus::Attached));
        let events = drain_events(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::StatusReported {
                status: Some(AttachmentStatus::Attached),
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_attach_then_detach_round_trip() {
        let factory = FakePatcherFactory::new();
        let mut engine = engine_with(installed(), &factory, payload_found());

        engine.process_message(Message::Toggle);
        engine.run_until_settled().await;
        assert!(engine.state.is_attached());
        assert_eq!(engine.state.reporter.text(), Some("Successfully injected!"));

        engine.process_message(Message::Toggle);
        engine.run_until_settled().await;
        assert!(!engine.state.is_attached());
        assert_eq!(engine.state.reporter.text(), Some("Successfully ejected!"));
        assert!(factory.attached().is_empty());
        assert_eq!(engine.state.completed_operations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_message_clears_after_ttl() {
        let factory = FakePatcherFactory::new();
        let mut engine = engine_with(installed(), &factory, payload_found());

        let started = tokio::time::Instant::now();
        engine.process_message(Message::RequestOperation(OperationKind::Attach));
        engine.run_until_settled().await;
        assert_eq!(engine.state.reporter.text(), Some("Successfully injected!"));

        // Only the expiry timer is left; paused time jumps straight to it
        assert!(engine.process_next().await);
        assert!(engine.state.reporter.text().is_none());
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_failure_message_never_clears() {
        let factory = FakePatcherFactory::new();
        factory.state().fail_attach = Some("ldid: invalid signature".to_string());
        let mut engine = engine_with(installed(), &factory, payload_found());
        let mut rx = engine.subscribe();

        engine.process_message(Message::RequestOperation(OperationKind::Attach));
        engine.run_until_settled().await;

        assert_eq!(engine.state.reporter.text(), Some("Injection failed"));
        assert!(engine.state.reporter.is_error_visible());
        assert_eq!(engine.drain_pending_messages(), 0);

        let events = drain_events(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::ErrorRaised { message } if message == "ldid: invalid signature"
        )));
    }

    #[tokio::test]
    async fn test_payload_missing_never_opens_patcher() {
        let factory = FakePatcherFactory::new();
        let mut locator = MockPayloadLocator::new();
        locator.expect_locate().returning(|_| None);
        let mut engine = engine_with(installed(), &factory, Arc::new(locator));

        engine.process_message(Message::RequestOperation(OperationKind::Attach));
        engine.run_until_settled().await;

        assert_eq!(engine.state.reporter.text(), Some(PAYLOAD_MISSING_MESSAGE));
        assert_eq!(
            engine.state.reporter.last_error(),
            Some("Could not find FIle.dylib in app bundle or Documents folder")
        );
        assert_eq!(factory.open_count(), 0);
    }

    #[tokio::test]
    async fn test_busy_exclusion() {
        let factory = FakePatcherFactory::new().gated();
        let mut engine = engine_with(installed(), &factory, payload_found());

        engine.process_message(Message::RequestOperation(OperationKind::Attach));
        factory.wait_entered().await;

        engine.process_message(Message::RequestOperation(OperationKind::Detach));
        assert_eq!(engine.state.reporter.text(), Some(BUSY_MESSAGE));
        assert_eq!(engine.state.in_flight, Some(OperationKind::Attach));

        factory.release();
        engine.run_until_settled().await;

        assert_eq!(engine.state.completed_operations, 1);
        assert_eq!(factory.state().attach_calls.len(), 1);
        assert!(factory.state().detach_calls.is_empty());
    }

    #[tokio::test]
    async fn test_config_snapshot_isolation() {
        let factory = FakePatcherFactory::new().gated();
        let mut engine = engine_with(installed(), &factory, payload_found());

        engine.process_message(Message::RequestOperation(OperationKind::Attach));
        factory.wait_entered().await;

        engine.process_message(Message::SetConfig(ConfigField::WeakReference(false)));
        engine.process_message(Message::SetConfig(ConfigField::Strategy(
            InjectStrategy::Fast,
        )));
        assert!(!engine.state.config.use_weak_reference);

        factory.release();
        engine.run_until_settled().await;

        // The running attach kept the options it was dispatched with
        let call = factory.state().attach_calls[0].clone();
        assert_eq!(call.options, InjectionConfiguration::default());

        // The next operation sees the new ones
        engine.process_message(Message::RequestOperation(OperationKind::Detach));
        factory.release();
        engine.run_until_settled().await;

        let call = factory.state().detach_calls[0].clone();
        assert!(!call.options.use_weak_reference);
        assert_eq!(call.options.strategy, InjectStrategy::Fast);
        assert_eq!(engine.config().strategy, InjectStrategy::Fast);
    }

    #[tokio::test]
    async fn test_not_installed_never_touches_patcher() {
        let factory = FakePatcherFactory::new();
        let mut locator = MockPayloadLocator::new();
        locator.expect_locate().never();
        let mut engine = engine_with(Catalog::default(), &factory, Arc::new(locator));

        engine.process_message(Message::RefreshStatus);
        engine.run_until_settled().await;
        assert!(engine.state.status.is_none());

        for kind in [OperationKind::Attach, OperationKind::Detach] {
            engine.process_message(Message::RequestOperation(kind));
            engine.run_until_settled().await;

            let report = engine.state.last_report.clone().unwrap();
            assert_eq!(report.outcome, OperationOutcome::NotApplicable);
        }

        assert_eq!(factory.open_count(), 0);
        assert!(!engine.state.reporter.is_error_visible());
    }

    #[tokio::test]
    async fn test_detach_failure_requeries_status() {
        let factory =
            FakePatcherFactory::with_attached(&["/Apps/FreeFire.app/Frameworks/FIle.dylib"]);
        factory.state().fail_detach = Some("ldid: failed to re-sign".to_string());
        let mut engine = engine_with(installed(), &factory, payload_found());

        engine.process_message(Message::RequestOperation(OperationKind::Detach));
        engine.run_until_settled().await;

        let report = engine.state.last_report.clone().unwrap();
        assert_eq!(report.final_phase(), OperationPhase::Failed);
        assert!(report.visited(OperationPhase::Verifying));
        assert_eq!(engine.state.status, Some(AttachmentStatus::Attached));
        assert_eq!(engine.state.reporter.text(), Some("Ejection failed"));
        assert_eq!(factory.state().list_count, 2);
    }

    #[tokio::test]
    async fn test_event_sequence_for_attach() {
        let factory = FakePatcherFactory::new();
        let mut engine = engine_with(installed(), &factory, payload_found());
        let mut rx = engine.subscribe();

        engine.process_message(Message::RequestOperation(OperationKind::Attach));
        engine.run_until_settled().await;

        let labels: Vec<_> = drain_events(&mut rx)
            .iter()
            .map(EngineEvent::event_type)
            .collect();
        assert_eq!(
            labels,
            vec![
                "operation_started",
                "status_message",
                "operation_finished",
                "status_reported",
                "status_message",
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_event() {
        let factory = FakePatcherFactory::new();
        let mut engine = engine_with(installed(), &factory, payload_found());
        let mut rx = engine.subscribe();

        engine.shutdown();

        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Shutdown)));
    }
}

//! Application state (Model in TEA pattern)

use std::time::Duration;

use dylink_core::{
    Application, AttachmentStatus, InjectionConfiguration, OperationKind, OperationReport,
};

use crate::reporter::Reporter;

/// Everything the interactive side shows, owned by the engine's event loop
#[derive(Debug, Clone)]
pub struct AppState {
    /// Bundle identifier of the managed app
    pub bid: String,

    /// Catalog entry for `bid`; `None` when the app is not installed
    pub application: Option<Application>,

    /// Result of the latest inspection or operation; `None` until known
    pub status: Option<AttachmentStatus>,

    /// Bumped whenever `status` is (re)established, even to the same value
    pub status_revision: u64,

    /// Operation currently running, if any
    pub in_flight: Option<OperationKind>,

    /// A status inspection is running
    pub inspecting: bool,

    /// Injection options as last read from the configuration store
    pub config: InjectionConfiguration,

    pub reporter: Reporter,

    /// How long success messages stay up
    pub status_message_ttl: Duration,

    pub last_report: Option<OperationReport>,

    /// Number of operations that reached a terminal outcome
    pub completed_operations: u64,
}

impl AppState {
    pub fn new(bid: impl Into<String>) -> Self {
        Self {
            bid: bid.into(),
            application: None,
            status: None,
            status_revision: 0,
            in_flight: None,
            inspecting: false,
            config: InjectionConfiguration::default(),
            reporter: Reporter::new(),
            status_message_ttl: Duration::from_millis(3000),
            last_report: None,
            completed_operations: 0,
        }
    }

    pub fn with_application(mut self, application: Option<Application>) -> Self {
        self.application = application;
        self
    }

    pub fn with_status_message_ttl(mut self, ttl: Duration) -> Self {
        self.status_message_ttl = ttl;
        self
    }

    pub fn is_installed(&self) -> bool {
        self.application.is_some()
    }

    /// An operation is running; new requests are refused
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.status.map(|s| s.is_attached()).unwrap_or(false)
    }

    /// The operation a toggle would start
    pub fn toggle_kind(&self) -> OperationKind {
        if self.is_attached() {
            OperationKind::Detach
        } else {
            OperationKind::Attach
        }
    }

    /// No operation or inspection is outstanding
    pub fn is_settled(&self) -> bool {
        !self.inspecting && self.in_flight.is_none()
    }

    pub(crate) fn set_status(&mut self, status: Option<AttachmentStatus>) {
        self.status = status;
        self.status_revision += 1;
    }
}

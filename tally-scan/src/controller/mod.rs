//! Scan controller
//!
//! Owns the scanning session: ledger, watch list, health gate, backend
//! configuration and the timers around a scan. One tokio task holds all of
//! it; everything else talks to that task through a [`ControllerHandle`].
//!
//! # State machine
//!
//! ```text
//!            scan accepted              re-arm delay
//!   Armed ───────────────► Processing ──────────────► Armed
//!     ▲                        │                        or AwaitingResult
//!     │                        │ lookup done            (result still shown)
//!     └── dismissed ◄── AwaitingResult ◄────────────────┘
//! ```
//!
//! A scan arriving during `Processing` is dropped. A scan during
//! `AwaitingResult` is accepted and supersedes the displayed result.

mod engine;
mod timer;

use engine::ControllerCore;

use crate::feedback::FeedbackSink;
use crate::lookup::InventoryBackend;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tally_common::config::TimingConfig;
use tally_common::events::{ControllerState, EventBus, ScanEvent};
use tally_common::{ApiConfig, Error, HealthState, LookupResult, Result, ScanEntry};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Command queue depth between handles and the controller task
const COMMAND_CAPACITY: usize = 64;

/// Controller timing, taken from the `[timing]` section of the bootstrap file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub rearm_delay: Duration,
    pub result_display: Duration,
    pub vibration: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for ControllerSettings {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            rearm_delay: timing.rearm_delay(),
            result_display: timing.result_display(),
            vibration: timing.vibration(),
        }
    }
}

/// What happened to a submitted scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    Accepted {
        scan_id: u64,
        is_new_entry: bool,
        watched: bool,
        lookup_started: bool,
    },
    /// Another scan was still being processed
    Dropped,
    /// Backend unhealthy; a `BackendUnavailable` notification was broadcast
    Blocked,
    /// Intake suspended by the operator
    Paused,
}

impl ScanOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ScanOutcome::Accepted { .. })
    }
}

/// Lookup result currently displayed to the operator
#[derive(Debug, Clone, Serialize)]
pub struct ActiveResultView {
    pub scan_id: u64,
    pub code: String,
    pub result: LookupResult,
    /// Caption line, present for found products
    pub summary: Option<String>,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: ControllerState,
    /// Newest first
    pub entries: Vec<ScanEntry>,
    pub total: u64,
    pub latest_index: Option<usize>,
    pub health: HealthState,
    pub active_result: Option<ActiveResultView>,
    pub watch_codes: usize,
    pub intake_paused: bool,
    pub lookup_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub text: String,
    pub entries: usize,
    pub total: u64,
}

/// Watch list as entered plus its normalized codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertListView {
    pub raw: String,
    pub codes: Vec<String>,
}

/// Requests from handles to the controller task
#[derive(Debug)]
pub(crate) enum Command {
    Scan {
        code: String,
        reply: oneshot::Sender<Result<ScanOutcome>>,
    },
    Decrement {
        index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        index: usize,
        reply: oneshot::Sender<Result<ScanEntry>>,
    },
    Export {
        reply: oneshot::Sender<Result<ExportSummary>>,
    },
    SetAlertList {
        raw: String,
        reply: oneshot::Sender<usize>,
    },
    GetAlertList {
        reply: oneshot::Sender<AlertListView>,
    },
    UpdateConfig {
        config: ApiConfig,
        reply: oneshot::Sender<()>,
    },
    GetConfig {
        reply: oneshot::Sender<ApiConfig>,
    },
    RecheckHealth {
        reply: oneshot::Sender<()>,
    },
    DismissResult {
        reply: oneshot::Sender<bool>,
    },
    SetIntakePaused {
        paused: bool,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Completions posted back by tasks the controller spawned
#[derive(Debug)]
pub(crate) enum Internal {
    RearmElapsed { scan_id: u64 },
    LookupFinished { scan_id: u64, result: LookupResult },
    DismissElapsed { token: u64 },
    HealthProbed { generation: u64, state: HealthState },
}

/// Cloneable access to a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    bus: EventBus,
}

impl ControllerHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::ControllerStopped)?;
        response.await.map_err(|_| Error::ControllerStopped)
    }

    /// Submit one scan event
    ///
    /// # Errors
    /// [`Error::InvalidInput`] for a blank code, [`Error::ControllerStopped`]
    /// if the controller task is gone.
    pub async fn scan(&self, code: impl Into<String>) -> Result<ScanOutcome> {
        let code = code.into();
        self.request(|reply| Command::Scan { code, reply }).await?
    }

    pub async fn decrement(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::Decrement { index, reply }).await?
    }

    pub async fn remove(&self, index: usize) -> Result<ScanEntry> {
        self.request(|reply| Command::Remove { index, reply }).await?
    }

    /// Serialize the ledger and post it to the backend
    ///
    /// # Errors
    /// [`Error::BackendUnavailable`] while the backend is unhealthy.
    pub async fn export(&self) -> Result<ExportSummary> {
        self.request(|reply| Command::Export { reply }).await?
    }

    /// Replace the watch list; returns the number of watch codes
    pub async fn set_alert_list(&self, raw: impl Into<String>) -> Result<usize> {
        let raw = raw.into();
        self.request(|reply| Command::SetAlertList { raw, reply }).await
    }

    pub async fn alert_list(&self) -> Result<AlertListView> {
        self.request(|reply| Command::GetAlertList { reply }).await
    }

    /// Install a new backend configuration and re-probe health
    pub async fn update_config(&self, config: ApiConfig) -> Result<()> {
        self.request(|reply| Command::UpdateConfig { config, reply }).await
    }

    pub async fn config(&self) -> Result<ApiConfig> {
        self.request(|reply| Command::GetConfig { reply }).await
    }

    pub async fn recheck_health(&self) -> Result<()> {
        self.request(|reply| Command::RecheckHealth { reply }).await
    }

    /// Dismiss the displayed result; false if nothing was displayed
    pub async fn dismiss_result(&self) -> Result<bool> {
        self.request(|reply| Command::DismissResult { reply }).await
    }

    pub async fn set_intake_paused(&self, paused: bool) -> Result<()> {
        self.request(|reply| Command::SetIntakePaused { paused, reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.bus.subscribe()
    }
}

/// Start the controller task
///
/// A startup health probe is issued immediately. The task exits once every
/// [`ControllerHandle`] has been dropped.
pub fn spawn(
    settings: ControllerSettings,
    config: ApiConfig,
    backend: Arc<dyn InventoryBackend>,
    feedback: Arc<dyn FeedbackSink>,
    bus: EventBus,
) -> (ControllerHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();

    let core = ControllerCore::new(settings, config, backend, feedback, bus.clone(), internal_tx);
    let task = tokio::spawn(core.run(command_rx, internal_rx));

    (
        ControllerHandle {
            commands: command_tx,
            bus,
        },
        task,
    )
}

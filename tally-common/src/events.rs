//! Event types for the Stock Tally event system
//!
//! Provides the shared event definitions and the EventBus used to fan
//! controller output out to presentation clients (SSE) and tests.

use crate::types::{HealthState, LookupResult, ScanEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Scan controller state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Ready to accept a scan
    Armed,
    /// A scan was accepted and the re-arm delay has not elapsed; new scans are dropped
    Processing,
    /// A lookup result is displayed; a new scan supersedes it
    AwaitingResult,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerState::Armed => write!(f, "armed"),
            ControllerState::Processing => write!(f, "processing"),
            ControllerState::AwaitingResult => write!(f, "awaiting_result"),
        }
    }
}

/// Why a scan event was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Another scan is still being processed (debounce)
    Busy,
    /// Health gate reports the backend as unhealthy
    BackendUnhealthy,
    /// Intake suspended by the operator (an editor is open)
    Paused,
}

/// How a displayed lookup result went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    Timeout,
    Operator,
    Superseded,
}

/// Operation refused by the health gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatedAction {
    Scan,
    Export,
}

/// Audio cue selected for a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// Ordinary scan
    Normal,
    /// Code is on the watch list
    Watched,
    /// Backend flagged the item as requiring special handling
    Escalation,
}

impl Cue {
    /// Sound asset the presentation client plays for this cue
    pub fn asset_name(&self) -> &'static str {
        match self {
            Cue::Normal => "beep.mp3",
            Cue::Watched => "warning.mp3",
            Cue::Escalation => "hangchuy.mp3",
        }
    }
}

/// Physical or audible feedback requested from the presentation client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedbackRequest {
    Vibrate { duration_ms: u64 },
    Cue { cue: Cue, asset: String },
}

/// Stock Tally event types
///
/// Broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// A scan was accepted and recorded
    ScanAccepted {
        scan_id: u64,
        code: String,
        /// False when the scan merged into the latest entry
        is_new_entry: bool,
        /// Code matched the watch list
        watched: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A scan was not processed
    ScanRejected {
        code: String,
        reason: RejectReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ledger contents changed (full contents, newest first)
    LedgerChanged {
        entries: Vec<ScanEntry>,
        total: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    ControllerStateChanged {
        old_state: ControllerState,
        new_state: ControllerState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    HealthChanged {
        old_state: HealthState,
        new_state: HealthState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A lookup result is now displayed
    LookupResultShown {
        scan_id: u64,
        code: String,
        result: LookupResult,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The displayed lookup result was dismissed (emitted once per result)
    LookupResultDismissed {
        scan_id: u64,
        reason: DismissReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Blocking notification: backend unhealthy, the operator should reconfigure
    BackendUnavailable {
        action: GatedAction,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    FeedbackRequested {
        feedback: FeedbackRequest,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Ledger text ready for the clipboard
    ExportCompleted {
        text: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    AlertListChanged {
        watch_codes: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    IntakeChanged {
        paused: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ScanEvent {
    /// Event type string used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::ScanAccepted { .. } => "ScanAccepted",
            ScanEvent::ScanRejected { .. } => "ScanRejected",
            ScanEvent::LedgerChanged { .. } => "LedgerChanged",
            ScanEvent::ControllerStateChanged { .. } => "ControllerStateChanged",
            ScanEvent::HealthChanged { .. } => "HealthChanged",
            ScanEvent::LookupResultShown { .. } => "LookupResultShown",
            ScanEvent::LookupResultDismissed { .. } => "LookupResultDismissed",
            ScanEvent::BackendUnavailable { .. } => "BackendUnavailable",
            ScanEvent::FeedbackRequested { .. } => "FeedbackRequested",
            ScanEvent::ExportCompleted { .. } => "ExportCompleted",
            ScanEvent::AlertListChanged { .. } => "AlertListChanged",
            ScanEvent::IntakeChanged { .. } => "IntakeChanged",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`: publishing never blocks, slow subscribers see
/// `Lagged` rather than slowing the controller down.
///
/// # Examples
///
/// ```
/// use tally_common::events::{EventBus, ScanEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(ScanEvent::IntakeChanged {
///     paused: true,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(ScanEvent::IntakeChanged { paused: true, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: ScanEvent) -> Result<usize, broadcast::error::SendError<ScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }
}

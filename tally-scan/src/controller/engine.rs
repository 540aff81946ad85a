//! Controller task: state and transitions
//!
//! [`ControllerCore`] is owned by exactly one task. Work that can take time
//! (lookups, health probes, exports, timers) is spawned and reports back on
//! the internal channel, so a command is always answered without waiting on
//! the network.

use super::timer::SingleShot;
use super::{
    ActiveResultView, AlertListView, Command, ControllerSettings, ExportSummary, Internal,
    ScanOutcome, SessionSnapshot,
};
use crate::alert::AlertRuleSet;
use crate::feedback::FeedbackSink;
use crate::health::{self, HealthGate, ProbeOutcome};
use crate::ledger::ScanLedger;
use crate::lookup::InventoryBackend;
use chrono::Utc;
use std::sync::Arc;
use tally_common::events::{
    ControllerState, Cue, DismissReason, EventBus, GatedAction, RejectReason, ScanEvent,
};
use tally_common::{ApiConfig, Error, HealthState, LookupResult, Result, ScanEntry};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Most recently accepted scan; lookups for any other scan are stale
struct CurrentScan {
    scan_id: u64,
    code: String,
}

/// Lookup result on screen, with its auto-dismiss timer
struct ActiveResult {
    scan_id: u64,
    code: String,
    result: LookupResult,
    dismiss_timer: SingleShot,
}

pub struct ControllerCore {
    settings: ControllerSettings,
    state: ControllerState,
    ledger: ScanLedger,
    alerts: AlertRuleSet,
    alert_raw: String,
    health: HealthGate,
    config: ApiConfig,
    intake_paused: bool,

    next_scan_id: u64,
    current_scan: Option<CurrentScan>,
    active_result: Option<ActiveResult>,
    rearm_timer: Option<SingleShot>,
    next_timer_token: u64,

    backend: Arc<dyn InventoryBackend>,
    feedback: Arc<dyn FeedbackSink>,
    bus: EventBus,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl ControllerCore {
    pub(crate) fn new(
        settings: ControllerSettings,
        config: ApiConfig,
        backend: Arc<dyn InventoryBackend>,
        feedback: Arc<dyn FeedbackSink>,
        bus: EventBus,
        internal_tx: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        Self {
            settings,
            state: ControllerState::Armed,
            ledger: ScanLedger::new(),
            alerts: AlertRuleSet::default(),
            alert_raw: String::new(),
            health: HealthGate::new(),
            config,
            intake_paused: false,
            next_scan_id: 1,
            current_scan: None,
            active_result: None,
            rearm_timer: None,
            next_timer_token: 1,
            backend,
            feedback,
            bus,
            internal_tx,
        }
    }

    /// Controller main loop
    ///
    /// Timer and task completions are drained before new commands so a
    /// command never observes a state the clock has already moved past.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!("Scan controller started");
        self.start_health_probe("startup");

        loop {
            tokio::select! {
                biased;

                Some(event) = internal.recv() => self.handle_internal(event),

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        self.cancel_timers();
        info!("Scan controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            Command::Scan { code, reply } => {
                let _ = reply.send(self.handle_scan(code));
            }
            Command::Decrement { index, reply } => {
                let _ = reply.send(self.decrement(index));
            }
            Command::Remove { index, reply } => {
                let _ = reply.send(self.remove(index));
            }
            Command::Export { reply } => {
                let _ = reply.send(self.export());
            }
            Command::SetAlertList { raw, reply } => {
                let _ = reply.send(self.set_alert_list(raw));
            }
            Command::GetAlertList { reply } => {
                let _ = reply.send(AlertListView {
                    raw: self.alert_raw.clone(),
                    codes: self.alerts.sorted_codes(),
                });
            }
            Command::UpdateConfig { config, reply } => {
                self.config = config;
                info!(domain = %self.config.domain, branch = %self.config.branch, "Backend configuration updated");
                self.start_health_probe("config_change");
                let _ = reply.send(());
            }
            Command::GetConfig { reply } => {
                let _ = reply.send(self.config.clone());
            }
            Command::RecheckHealth { reply } => {
                self.start_health_probe("recheck");
                let _ = reply.send(());
            }
            Command::DismissResult { reply } => {
                let _ = reply.send(self.dismiss_result(DismissReason::Operator));
            }
            Command::SetIntakePaused { paused, reply } => {
                self.set_intake_paused(paused);
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::RearmElapsed { scan_id } => self.on_rearm(scan_id),
            Internal::LookupFinished { scan_id, result } => self.on_lookup_finished(scan_id, result),
            Internal::DismissElapsed { token } => {
                let current = self
                    .active_result
                    .as_ref()
                    .map(|active| active.dismiss_timer.token());
                if current == Some(token) {
                    self.dismiss_result(DismissReason::Timeout);
                } else {
                    debug!(token, "Ignoring expired dismiss timer");
                }
            }
            Internal::HealthProbed { generation, state } => self.on_health_probed(generation, state),
        }
    }

    // ------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------

    fn handle_scan(&mut self, code: String) -> Result<ScanOutcome> {
        if code.trim().is_empty() {
            return Err(Error::InvalidInput("Scan code must not be empty".to_string()));
        }

        if self.intake_paused {
            debug!(code = %code, "Intake paused, rejecting scan");
            self.emit_rejected(code, RejectReason::Paused);
            return Ok(ScanOutcome::Paused);
        }

        if self.state == ControllerState::Processing {
            debug!(code = %code, "Controller busy, dropping scan");
            self.emit_rejected(code, RejectReason::Busy);
            return Ok(ScanOutcome::Dropped);
        }

        if self.health.is_blocking() {
            warn!(code = %code, "Backend unhealthy, refusing scan");
            self.bus.emit_lossy(ScanEvent::BackendUnavailable {
                action: GatedAction::Scan,
                timestamp: Utc::now(),
            });
            self.emit_rejected(code, RejectReason::BackendUnhealthy);
            return Ok(ScanOutcome::Blocked);
        }

        let scan_id = self.next_scan_id;
        self.next_scan_id += 1;
        self.current_scan = Some(CurrentScan {
            scan_id,
            code: code.clone(),
        });

        self.dismiss_result(DismissReason::Superseded);
        self.set_state(ControllerState::Processing);

        let is_new_entry = self.ledger.record(&code);
        let watched = self.alerts.is_watched(&code);
        info!(scan_id, code = %code, is_new_entry, watched, "Scan accepted");

        self.bus.emit_lossy(ScanEvent::ScanAccepted {
            scan_id,
            code: code.clone(),
            is_new_entry,
            watched,
            timestamp: Utc::now(),
        });
        self.emit_ledger_changed();

        self.vibrate();
        self.play(if watched { Cue::Watched } else { Cue::Normal });

        let lookup_started = self.config.is_lookup_configured();
        if lookup_started {
            self.start_lookup(scan_id, code);
        } else {
            debug!(scan_id, "Backend not configured, skipping lookup");
        }

        if let Some(previous) = self.rearm_timer.take() {
            previous.cancel();
        }
        let token = self.next_token();
        self.rearm_timer = Some(SingleShot::schedule(
            token,
            self.settings.rearm_delay,
            self.internal_tx.clone(),
            Internal::RearmElapsed { scan_id },
        ));

        Ok(ScanOutcome::Accepted {
            scan_id,
            is_new_entry,
            watched,
            lookup_started,
        })
    }

    fn on_rearm(&mut self, scan_id: u64) {
        if self.current_scan_id() != Some(scan_id) || self.state != ControllerState::Processing {
            return;
        }
        self.rearm_timer = None;

        let next = if self.active_result.is_some() {
            ControllerState::AwaitingResult
        } else {
            ControllerState::Armed
        };
        self.set_state(next);
    }

    /// Run the lookup on its own task
    ///
    /// The lookup runs inside a second task so a panic is caught by its
    /// `JoinHandle` and reported as a failed lookup.
    fn start_lookup(&self, scan_id: u64, code: String) {
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let lookup_code = code.clone();
            let lookup = tokio::spawn(async move { backend.lookup(&config, &lookup_code).await });

            let result = match lookup.await {
                Ok(result) => result,
                Err(e) => {
                    error!(scan_id, code = %code, error = %e, "Lookup task failed");
                    LookupResult::failed("Lookup failed unexpectedly, please contact an administrator")
                }
            };

            let _ = tx.send(Internal::LookupFinished { scan_id, result });
        });
    }

    fn on_lookup_finished(&mut self, scan_id: u64, result: LookupResult) {
        let code = match &self.current_scan {
            Some(current) if current.scan_id == scan_id => current.code.clone(),
            _ => {
                debug!(scan_id, "Discarding stale lookup result");
                return;
            }
        };

        if result.is_warning() {
            self.play(Cue::Escalation);
        }

        let token = self.next_token();
        let dismiss_timer = SingleShot::schedule(
            token,
            self.settings.result_display,
            self.internal_tx.clone(),
            Internal::DismissElapsed { token },
        );

        debug!(scan_id, code = %code, found = result.error_message().is_none(), "Showing lookup result");
        self.bus.emit_lossy(ScanEvent::LookupResultShown {
            scan_id,
            code: code.clone(),
            result: result.clone(),
            timestamp: Utc::now(),
        });

        self.active_result = Some(ActiveResult {
            scan_id,
            code,
            result,
            dismiss_timer,
        });

        if self.state == ControllerState::Armed {
            self.set_state(ControllerState::AwaitingResult);
        }
    }

    /// Take down the displayed result; true if one was displayed
    fn dismiss_result(&mut self, reason: DismissReason) -> bool {
        let Some(active) = self.active_result.take() else {
            return false;
        };
        active.dismiss_timer.cancel();

        debug!(scan_id = active.scan_id, reason = ?reason, "Lookup result dismissed");
        self.bus.emit_lossy(ScanEvent::LookupResultDismissed {
            scan_id: active.scan_id,
            reason,
            timestamp: Utc::now(),
        });

        if self.state == ControllerState::AwaitingResult {
            self.set_state(ControllerState::Armed);
        }
        true
    }

    fn set_intake_paused(&mut self, paused: bool) {
        if self.intake_paused == paused {
            return;
        }
        self.intake_paused = paused;
        info!(paused, "Scan intake {}", if paused { "paused" } else { "resumed" });
        self.bus.emit_lossy(ScanEvent::IntakeChanged {
            paused,
            timestamp: Utc::now(),
        });
    }

    // ------------------------------------------------------------------
    // Ledger editing and export
    // ------------------------------------------------------------------

    fn decrement(&mut self, index: usize) -> Result<()> {
        self.ledger.decrement(index).map_err(|e| {
            warn!(index, error = %e, "Decrement rejected");
            e
        })?;
        self.emit_ledger_changed();
        Ok(())
    }

    fn remove(&mut self, index: usize) -> Result<ScanEntry> {
        let removed = self.ledger.remove(index).map_err(|e| {
            warn!(index, error = %e, "Remove rejected");
            e
        })?;
        info!(index, value = %removed.value, count = removed.count, "Ledger entry removed");
        self.emit_ledger_changed();
        Ok(removed)
    }

    fn export(&mut self) -> Result<ExportSummary> {
        if self.health.is_blocking() {
            warn!("Backend unhealthy, refusing export");
            self.bus.emit_lossy(ScanEvent::BackendUnavailable {
                action: GatedAction::Export,
                timestamp: Utc::now(),
            });
            return Err(Error::BackendUnavailable(
                "Inventory backend is unavailable, check the API configuration".to_string(),
            ));
        }

        let text = self.ledger.serialize();
        let summary = ExportSummary {
            text: text.clone(),
            entries: self.ledger.len(),
            total: self.ledger.total_count(),
        };
        info!(entries = summary.entries, total = summary.total, "Ledger exported");
        self.bus.emit_lossy(ScanEvent::ExportCompleted {
            text,
            timestamp: Utc::now(),
        });

        if self.config.is_lookup_configured() {
            let backend = Arc::clone(&self.backend);
            let config = self.config.clone();
            let items = self.ledger.entries().to_vec();
            tokio::spawn(async move {
                if let Err(e) = backend.export_scan_result(&config, &items).await {
                    warn!(error = %e, "Posting scan result to backend failed");
                }
            });
        } else {
            debug!("Backend not configured, skipping scan result upload");
        }

        Ok(summary)
    }

    fn set_alert_list(&mut self, raw: String) -> usize {
        self.alerts = AlertRuleSet::parse(&raw);
        self.alert_raw = raw;

        let watch_codes = self.alerts.len();
        info!(watch_codes, "Watch list replaced");
        self.bus.emit_lossy(ScanEvent::AlertListChanged {
            watch_codes,
            timestamp: Utc::now(),
        });
        watch_codes
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    fn start_health_probe(&mut self, trigger: &'static str) {
        let generation = self.health.begin_probe();
        debug!(generation, trigger, "Starting health probe");

        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let state = health::probe(backend.as_ref(), &config).await;
            let _ = tx.send(Internal::HealthProbed { generation, state });
        });
    }

    fn on_health_probed(&mut self, generation: u64, state: HealthState) {
        match self.health.complete_probe(generation, state) {
            ProbeOutcome::Stale => {
                debug!(generation, state = %state, "Discarding stale health probe");
            }
            ProbeOutcome::Unchanged => {
                debug!(state = %state, "Backend health unchanged");
            }
            ProbeOutcome::Changed { old, new } => {
                if new == HealthState::Unhealthy {
                    warn!(old_state = %old, "Inventory backend unhealthy");
                } else {
                    info!(old_state = %old, new_state = %new, "Backend health changed");
                }
                self.bus.emit_lossy(ScanEvent::HealthChanged {
                    old_state: old,
                    new_state: new,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn set_state(&mut self, new_state: ControllerState) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;
        debug!(old_state = %old_state, new_state = %new_state, "Controller state changed");
        self.bus.emit_lossy(ScanEvent::ControllerStateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn current_scan_id(&self) -> Option<u64> {
        self.current_scan.as_ref().map(|current| current.scan_id)
    }

    fn next_token(&mut self) -> u64 {
        let token = self.next_timer_token;
        self.next_timer_token += 1;
        token
    }

    fn vibrate(&self) {
        if let Err(e) = self.feedback.vibrate(self.settings.vibration) {
            warn!(error = %e, "Vibration feedback failed");
        }
    }

    fn play(&self, cue: Cue) {
        if let Err(e) = self.feedback.play(cue) {
            warn!(cue = ?cue, error = %e, "Audio cue failed");
        }
    }

    fn emit_rejected(&self, code: String, reason: RejectReason) {
        self.bus.emit_lossy(ScanEvent::ScanRejected {
            code,
            reason,
            timestamp: Utc::now(),
        });
    }

    fn emit_ledger_changed(&self) {
        self.bus.emit_lossy(ScanEvent::LedgerChanged {
            entries: self.ledger.entries().to_vec(),
            total: self.ledger.total_count(),
            timestamp: Utc::now(),
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            entries: self.ledger.entries().to_vec(),
            total: self.ledger.total_count(),
            latest_index: self.ledger.latest_index(),
            health: self.health.state(),
            active_result: self.active_result.as_ref().map(|active| ActiveResultView {
                scan_id: active.scan_id,
                code: active.code.clone(),
                result: active.result.clone(),
                summary: match &active.result {
                    LookupResult::Found(info) => Some(info.summary_line()),
                    LookupResult::Failed { .. } => None,
                },
            }),
            watch_codes: self.alerts.len(),
            intake_paused: self.intake_paused,
            lookup_configured: self.config.is_lookup_configured(),
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.rearm_timer.take() {
            timer.cancel();
        }
        if let Some(active) = self.active_result.take() {
            active.dismiss_timer.cancel();
        }
    }
}

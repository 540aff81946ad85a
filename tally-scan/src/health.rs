//! Backend health gate
//!
//! Tracks whether the inventory backend is configured and reachable.
//! `Unknown` until the first probe completes, then `Healthy` or `Unhealthy`,
//! re-evaluated on every configuration change or explicit re-check. One probe
//! per trigger: no retries, no hysteresis.
//!
//! While `Unhealthy`, scanning and export are refused. `Unknown` does not gate.

use crate::lookup::InventoryBackend;
use tally_common::{ApiConfig, HealthState};
use tracing::{debug, warn};

/// Run one health probe
///
/// Incomplete configuration short-circuits to `Unhealthy` without any
/// network traffic.
pub async fn probe(backend: &dyn InventoryBackend, config: &ApiConfig) -> HealthState {
    let missing = config.missing_fields();
    if !missing.is_empty() {
        debug!(missing = ?missing, "Backend configuration incomplete, skipping health probe");
        return HealthState::Unhealthy;
    }

    match backend.check_health(config).await {
        Ok(()) => HealthState::Healthy,
        Err(e) => {
            warn!(domain = %config.domain, error = %e, "Backend health probe failed");
            HealthState::Unhealthy
        }
    }
}

/// Result of offering a probe outcome to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A newer probe was started after this one; ignored
    Stale,
    Unchanged,
    Changed { old: HealthState, new: HealthState },
}

/// Health state machine
///
/// Each probe is tagged with a generation; only the newest probe's outcome
/// is applied, so a slow probe against an old configuration cannot overwrite
/// the answer for the current one.
#[derive(Debug)]
pub struct HealthGate {
    state: HealthState,
    generation: u64,
}

impl HealthGate {
    pub fn new() -> Self {
        Self {
            state: HealthState::Unknown,
            generation: 0,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    /// True when scanning and export must be refused
    pub fn is_blocking(&self) -> bool {
        self.state == HealthState::Unhealthy
    }

    /// Register a new probe and return its generation tag
    pub fn begin_probe(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Apply the outcome of the probe tagged `generation`
    pub fn complete_probe(&mut self, generation: u64, state: HealthState) -> ProbeOutcome {
        if generation != self.generation {
            return ProbeOutcome::Stale;
        }
        if state == self.state {
            return ProbeOutcome::Unchanged;
        }

        let old = self.state;
        self.state = state;
        ProbeOutcome::Changed { old, new: state }
    }
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_common::{Error, LookupResult, Result, ScanEntry};

    struct CountingBackend {
        healthy: bool,
        probes: AtomicUsize,
    }

    #[async_trait]
    impl InventoryBackend for CountingBackend {
        async fn lookup(&self, _config: &ApiConfig, _code: &str) -> LookupResult {
            LookupResult::failed("unused")
        }

        async fn check_health(&self, _config: &ApiConfig) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(())
            } else {
                Err(Error::Network("status 500".to_string()))
            }
        }

        async fn export_scan_result(&self, _config: &ApiConfig, _items: &[ScanEntry]) -> Result<()> {
            Ok(())
        }
    }

    fn backend(healthy: bool) -> CountingBackend {
        CountingBackend {
            healthy,
            probes: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_incomplete_config_skips_network() {
        let backend = backend(true);
        let config = ApiConfig::new("https://inv.example.com", "", "key");

        assert_eq!(probe(&backend, &config).await, HealthState::Unhealthy);
        assert_eq!(backend.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_maps_backend_answer() {
        let config = ApiConfig::new("https://inv.example.com", "HN", "key");

        let ok = backend(true);
        assert_eq!(probe(&ok, &config).await, HealthState::Healthy);
        assert_eq!(ok.probes.load(Ordering::SeqCst), 1);

        let failing = backend(false);
        assert_eq!(probe(&failing, &config).await, HealthState::Unhealthy);
    }

    #[test]
    fn test_gate_starts_unknown_and_open() {
        let gate = HealthGate::new();
        assert_eq!(gate.state(), HealthState::Unknown);
        assert!(!gate.is_blocking());
    }

    #[test]
    fn test_gate_transitions_freely() {
        let mut gate = HealthGate::new();

        let g1 = gate.begin_probe();
        assert_eq!(
            gate.complete_probe(g1, HealthState::Unhealthy),
            ProbeOutcome::Changed {
                old: HealthState::Unknown,
                new: HealthState::Unhealthy
            }
        );
        assert!(gate.is_blocking());

        let g2 = gate.begin_probe();
        assert_eq!(
            gate.complete_probe(g2, HealthState::Healthy),
            ProbeOutcome::Changed {
                old: HealthState::Unhealthy,
                new: HealthState::Healthy
            }
        );
        assert!(!gate.is_blocking());

        let g3 = gate.begin_probe();
        assert_eq!(gate.complete_probe(g3, HealthState::Healthy), ProbeOutcome::Unchanged);
    }

    #[test]
    fn test_stale_probe_is_ignored() {
        let mut gate = HealthGate::new();
        let old = gate.begin_probe();
        let current = gate.begin_probe();

        assert_eq!(gate.complete_probe(old, HealthState::Unhealthy), ProbeOutcome::Stale);
        assert_eq!(gate.state(), HealthState::Unknown);

        gate.complete_probe(current, HealthState::Healthy);
        assert_eq!(gate.state(), HealthState::Healthy);
    }
}

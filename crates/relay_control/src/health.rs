//! Health Monitor: periodic liveness probe against the relay host.

use std::time::Duration;

use shared::{domain::RelayPhase, protocol::HealthCheckResponse};
use tokio::sync::mpsc::UnboundedSender;

use crate::{error::RelayError, timer::TimerSlot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProbeOutcome {
    /// Probe answered; only `online` is updated.
    Observed { online: bool },
    /// The relay is supposed to be running but the probe reports it offline.
    Demote(RelayError),
    /// The probe itself could not be completed. Logged, never fatal.
    Failed(RelayError),
}

pub(crate) fn evaluate_probe(
    phase: RelayPhase,
    port: u16,
    result: Result<HealthCheckResponse, RelayError>,
) -> ProbeOutcome {
    match result {
        Ok(health) if !health.relay_online && phase == RelayPhase::Running => {
            let detail = if health.message.is_empty() {
                format!("Relay stopped responding on port {port}")
            } else {
                format!("Relay stopped responding on port {port}: {}", health.message)
            };
            ProbeOutcome::Demote(RelayError::ProbeFailure { detail })
        }
        Ok(health) => ProbeOutcome::Observed {
            online: health.relay_online,
        },
        Err(err) => ProbeOutcome::Failed(err),
    }
}

pub(crate) struct HealthMonitor {
    timer: TimerSlot,
    probe_in_flight: bool,
    probe_generation: u64,
}

impl HealthMonitor {
    pub fn new(period: Duration) -> Self {
        Self {
            timer: TimerSlot::new("health", period),
            probe_in_flight: false,
            probe_generation: 0,
        }
    }

    pub fn arm<M, F>(&mut self, mailbox: &UnboundedSender<M>, tick: F) -> bool
    where
        M: Send + 'static,
        F: Fn(u64) -> M + Send + 'static,
    {
        self.timer.arm(mailbox, tick)
    }

    pub fn disarm(&mut self) -> bool {
        self.probe_in_flight = false;
        self.timer.disarm()
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Whether a tick should launch a probe. Stale ticks and ticks that land
    /// while the previous probe is outstanding are skipped.
    pub fn begin_probe(&mut self, generation: u64) -> bool {
        if !self.timer.accepts(generation) || self.probe_in_flight {
            return false;
        }
        self.probe_in_flight = true;
        self.probe_generation = generation;
        true
    }

    /// Whether a probe result still belongs to the live timer.
    pub fn finish_probe(&mut self, generation: u64) -> bool {
        if !self.probe_in_flight
            || self.probe_generation != generation
            || !self.timer.accepts(generation)
        {
            return false;
        }
        self.probe_in_flight = false;
        true
    }
}

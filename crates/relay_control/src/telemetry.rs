//! Stats/Telemetry Feed. The counters are simulated; nothing here is derived
//! from the relay itself.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::domain::{NetworkStatus, RelayPhase, TelemetrySnapshot};
use tokio::sync::mpsc::UnboundedSender;

use crate::timer::TimerSlot;

pub const MAX_EARNED_INCREMENT_BTC: f64 = 0.000_001;
pub const PAYMENT_PROBABILITY: f64 = 0.3;
pub const CHANNEL_WALK_PROBABILITY: f64 = 0.1;
pub const MIN_CHANNELS: u32 = 1;

/// Uniform samples in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

pub struct SystemRandom {
    rng: StdRng,
}

impl SystemRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen()
    }
}

/// Reproducible sequence for demos and replay.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryDelta {
    pub earned: f64,
    pub new_payments: u64,
    pub channel_step: i32,
}

pub trait TelemetryStrategy: Send {
    fn next_delta(&mut self, current: &TelemetrySnapshot) -> TelemetryDelta;
}

pub struct SimulatedTelemetry<R: RandomSource = SystemRandom> {
    rng: R,
}

impl SimulatedTelemetry<SystemRandom> {
    pub fn from_entropy() -> Self {
        Self::new(SystemRandom::new())
    }
}

impl<R: RandomSource> SimulatedTelemetry<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RandomSource> TelemetryStrategy for SimulatedTelemetry<R> {
    fn next_delta(&mut self, _current: &TelemetrySnapshot) -> TelemetryDelta {
        let earned = self.rng.next_unit() * MAX_EARNED_INCREMENT_BTC;
        let new_payments = u64::from(self.rng.next_unit() < PAYMENT_PROBABILITY);
        let channel_step = if self.rng.next_unit() < CHANNEL_WALK_PROBABILITY {
            if self.rng.next_unit() < 0.5 {
                -1
            } else {
                1
            }
        } else {
            0
        };

        TelemetryDelta {
            earned,
            new_payments,
            channel_step,
        }
    }
}

/// Applies a delta while holding the feed invariants regardless of the
/// strategy: earnings never decrease and channels never drop below one.
pub fn apply_delta(snapshot: &mut TelemetrySnapshot, delta: &TelemetryDelta) {
    if delta.earned.is_finite() && delta.earned > 0.0 {
        snapshot.earned += delta.earned;
    }
    snapshot.payments = snapshot.payments.saturating_add(delta.new_payments);
    let channels = i64::from(snapshot.channels) + i64::from(delta.channel_step);
    snapshot.channels = channels.clamp(i64::from(MIN_CHANNELS), i64::from(u32::MAX)) as u32;
    snapshot.network = NetworkStatus::Connected;
}

pub(crate) struct TelemetryFeed {
    timer: TimerSlot,
    strategy: Box<dyn TelemetryStrategy>,
    snapshot: TelemetrySnapshot,
}

impl TelemetryFeed {
    pub fn new(period: Duration, strategy: Box<dyn TelemetryStrategy>) -> Self {
        Self {
            timer: TimerSlot::new("telemetry", period),
            strategy,
            snapshot: TelemetrySnapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Resets the counters for a fresh running session.
    pub fn begin_session(&mut self) {
        self.snapshot = TelemetrySnapshot {
            channels: MIN_CHANNELS,
            network: NetworkStatus::Connected,
            ..TelemetrySnapshot::default()
        };
    }

    pub fn arm<M, F>(&mut self, mailbox: &UnboundedSender<M>, tick: F) -> bool
    where
        M: Send + 'static,
        F: Fn(u64) -> M + Send + 'static,
    {
        self.timer.arm(mailbox, tick)
    }

    /// Freezes the counters and reflects the phase being entered.
    pub fn disarm(&mut self, next_phase: RelayPhase) -> bool {
        match next_phase {
            RelayPhase::Stopped => self.snapshot.network = NetworkStatus::Disconnected,
            RelayPhase::Error => self.snapshot.network = NetworkStatus::Error,
            RelayPhase::Starting | RelayPhase::Running | RelayPhase::Stopping => {}
        }
        self.timer.disarm()
    }

    pub fn tick(&mut self, generation: u64) -> Option<&TelemetrySnapshot> {
        if !self.timer.accepts(generation) {
            return None;
        }
        let delta = self.strategy.next_delta(&self.snapshot);
        apply_delta(&mut self.snapshot, &delta);
        Some(&self.snapshot)
    }
}

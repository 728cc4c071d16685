use std::time::Duration;

use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::debug;

/// One recurring timer that posts generation-tagged ticks into a mailbox.
///
/// Disarming aborts the task and bumps the generation, so ticks that were
/// already queued are rejected by [`TimerSlot::accepts`].
pub(crate) struct TimerSlot {
    label: &'static str,
    period: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub fn new(label: &'static str, period: Duration) -> Self {
        Self {
            label,
            period,
            generation: 0,
            task: None,
        }
    }

    /// No-op when already armed.
    pub fn arm<M, F>(&mut self, mailbox: &UnboundedSender<M>, tick: F) -> bool
    where
        M: Send + 'static,
        F: Fn(u64) -> M + Send + 'static,
    {
        if self.task.is_some() {
            return false;
        }

        self.generation += 1;
        let generation = self.generation;
        let period = self.period;
        let mailbox = mailbox.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if mailbox.send(tick(generation)).is_err() {
                    break;
                }
            }
        }));
        debug!(timer = self.label, generation, "timer armed");
        true
    }

    /// No-op when already disarmed.
    pub fn disarm(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        task.abort();
        self.generation += 1;
        debug!(timer = self.label, "timer disarmed");
        true
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    pub fn accepts(&self, generation: u64) -> bool {
        self.task.is_some() && self.generation == generation
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

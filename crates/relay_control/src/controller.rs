//! Lifecycle State Machine: a single actor task that owns the relay state,
//! the activity log, both timers and the telemetry counters.

use std::sync::Arc;

use shared::{
    domain::{LogLevel, PanelSnapshot, RelayPhase, RelayState},
    protocol::{HealthCheckResponse, LifecycleResponse, RelayCommand, RelayStatusResponse},
};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    config::ControllerSettings,
    error::RelayError,
    events::{ControllerEvent, RenderSink},
    gateway::{CommandGateway, RelayGateway},
    health::{evaluate_probe, HealthMonitor, ProbeOutcome},
    log_buffer::LogBuffer,
    telemetry::{SimulatedTelemetry, TelemetryFeed, TelemetryStrategy},
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleOp {
    Start,
    Stop,
}

enum ControlMessage {
    Start,
    Stop,
    ClearLogs,
    OpenRelayUrl,
    Snapshot(oneshot::Sender<PanelSnapshot>),
    Dispose(oneshot::Sender<()>),
    LifecycleCompleted {
        op: LifecycleOp,
        result: Result<LifecycleResponse, RelayError>,
    },
    OpenCompleted(Result<(), RelayError>),
    HealthTick(u64),
    ProbeCompleted {
        generation: u64,
        result: Result<HealthCheckResponse, RelayError>,
    },
    TelemetryTick(u64),
}

/// Handle to the running controller. Requests are fire-and-forget; their
/// effects are observed through the render sink, [`RelayController::snapshot`]
/// or [`RelayController::subscribe_events`].
pub struct RelayController {
    mailbox: mpsc::UnboundedSender<ControlMessage>,
    events: broadcast::Sender<ControllerEvent>,
    task: Option<JoinHandle<()>>,
}

impl RelayController {
    /// Spawns the controller with simulated telemetry. Must be called inside a
    /// tokio runtime. Startup reconciliation runs before any request is handled.
    pub fn start(
        gateway: Arc<dyn CommandGateway>,
        settings: ControllerSettings,
        sink: Box<dyn RenderSink>,
    ) -> Self {
        Self::start_with_strategy(
            gateway,
            settings,
            Box::new(SimulatedTelemetry::from_entropy()),
            sink,
        )
    }

    pub fn start_with_strategy(
        gateway: Arc<dyn CommandGateway>,
        settings: ControllerSettings,
        strategy: Box<dyn TelemetryStrategy>,
        sink: Box<dyn RenderSink>,
    ) -> Self {
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let core = ControllerCore {
            gateway: RelayGateway::new(gateway),
            state: RelayState::new(settings.relay_port),
            logs: LogBuffer::new(settings.log_capacity()),
            health: HealthMonitor::new(settings.health_interval()),
            feed: TelemetryFeed::new(settings.telemetry_interval(), strategy),
            sink,
            mailbox: mailbox.clone(),
            events: events.clone(),
        };
        let task = tokio::spawn(core.run(inbox));

        Self {
            mailbox,
            events,
            task: Some(task),
        }
    }

    pub fn request_start(&self) {
        self.send(ControlMessage::Start);
    }

    pub fn request_stop(&self) {
        self.send(ControlMessage::Stop);
    }

    pub fn clear_logs(&self) {
        self.send(ControlMessage::ClearLogs);
    }

    pub fn open_relay_url(&self) {
        self.send(ControlMessage::OpenRelayUrl);
    }

    /// Resolves after every previously issued request has been applied.
    pub async fn snapshot(&self) -> Result<PanelSnapshot, RelayError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(ControlMessage::Snapshot(reply))
            .map_err(|_| RelayError::ControllerClosed)?;
        response.await.map_err(|_| RelayError::ControllerClosed)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Disarms both timers and stops the actor. Nothing is applied afterwards.
    pub async fn dispose(mut self) {
        let (done, finished) = oneshot::channel();
        if self.mailbox.send(ControlMessage::Dispose(done)).is_ok() {
            let _ = finished.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, message: ControlMessage) {
        if self.mailbox.send(message).is_err() {
            warn!("relay controller is no longer running; request dropped");
        }
    }
}

impl Drop for RelayController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ControllerCore {
    gateway: RelayGateway,
    state: RelayState,
    logs: LogBuffer,
    health: HealthMonitor,
    feed: TelemetryFeed,
    sink: Box<dyn RenderSink>,
    mailbox: mpsc::UnboundedSender<ControlMessage>,
    events: broadcast::Sender<ControllerEvent>,
}

impl ControllerCore {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ControlMessage>) {
        self.reconcile().await;

        while let Some(message) = inbox.recv().await {
            match message {
                ControlMessage::Dispose(done) => {
                    self.shutdown();
                    let _ = done.send(());
                    break;
                }
                ControlMessage::Start => self.request_start(),
                ControlMessage::Stop => self.request_stop(),
                ControlMessage::ClearLogs => self.clear_logs(),
                ControlMessage::OpenRelayUrl => self.open_relay_url(),
                ControlMessage::Snapshot(reply) => {
                    let _ = reply.send(self.panel_snapshot());
                }
                ControlMessage::LifecycleCompleted { op, result } => match op {
                    LifecycleOp::Start => self.on_start_completed(result),
                    LifecycleOp::Stop => self.on_stop_completed(result),
                },
                ControlMessage::OpenCompleted(result) => self.on_open_completed(result),
                ControlMessage::HealthTick(generation) => self.on_health_tick(generation),
                ControlMessage::ProbeCompleted { generation, result } => {
                    self.on_probe_completed(generation, result)
                }
                ControlMessage::TelemetryTick(generation) => self.on_telemetry_tick(generation),
            }
        }
    }

    async fn reconcile(&mut self) {
        self.log(LogLevel::Info, "Relay operator ready");

        let (status, health) = tokio::join!(
            self.gateway.get_relay_status(),
            self.gateway.health_check()
        );
        let status = match status {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(error = %err, "initial relay status unavailable");
                self.log(
                    LogLevel::Warning,
                    format!("Could not read relay status: {err}"),
                );
                None
            }
        };
        let health = match health {
            Ok(health) => health,
            Err(err) => {
                warn!(error = %err, "initial health check failed");
                self.log(LogLevel::Warning, format!("Initial health check failed: {err}"));
                HealthCheckResponse::offline()
            }
        };

        self.apply_reconcile(status.as_ref(), &health);
    }

    fn apply_reconcile(
        &mut self,
        status: Option<&RelayStatusResponse>,
        health: &HealthCheckResponse,
    ) {
        self.state.online = health.relay_online;
        let running = status.is_some_and(|status| status.running);

        if running && health.relay_online {
            let message = status
                .map(|status| status.message.clone())
                .unwrap_or_else(|| "Relay running".to_string());
            self.enter_running(message);
            self.log(
                LogLevel::Success,
                format!("Relay already running on port {}", self.state.port),
            );
        } else if health.port_occupied() {
            let err = RelayError::ProbeFailure {
                detail: format!(
                    "port occupied by another service (port {})",
                    self.state.port
                ),
            };
            self.enter_error(err, LogLevel::Warning);
        } else {
            self.transition(RelayPhase::Stopped, "Relay stopped");
            self.log(LogLevel::Info, "Start your relay to begin earning");
        }

        self.render();
    }

    fn request_start(&mut self) {
        if matches!(
            self.state.phase,
            RelayPhase::Starting | RelayPhase::Running | RelayPhase::Stopping
        ) {
            debug!(phase = ?self.state.phase, "ignoring start request");
            return;
        }

        self.transition(RelayPhase::Starting, "Starting relay...");
        self.log(LogLevel::Info, "Starting relay...");
        self.render();

        let gateway = self.gateway.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = gateway.start_relay().await;
            let _ = mailbox.send(ControlMessage::LifecycleCompleted {
                op: LifecycleOp::Start,
                result,
            });
        });
    }

    fn on_start_completed(&mut self, result: Result<LifecycleResponse, RelayError>) {
        if self.state.phase != RelayPhase::Starting {
            debug!(phase = ?self.state.phase, "discarding stale start result");
            return;
        }

        match result {
            Ok(response) if response.is_running() => {
                self.log(
                    LogLevel::Success,
                    format!("Relay started: {}", response.message),
                );
                self.enter_running(response.message);
            }
            Ok(response) => {
                self.health.disarm();
                self.enter_error(
                    unexpected_status(RelayCommand::StartRelay, &response),
                    LogLevel::Error,
                );
            }
            Err(err) => {
                self.health.disarm();
                self.enter_error(err, LogLevel::Error);
            }
        }

        self.render();
    }

    fn request_stop(&mut self) {
        if matches!(
            self.state.phase,
            RelayPhase::Stopped | RelayPhase::Starting | RelayPhase::Stopping
        ) {
            debug!(phase = ?self.state.phase, "ignoring stop request");
            return;
        }

        self.feed.disarm(RelayPhase::Stopping);
        self.transition(RelayPhase::Stopping, "Stopping relay...");
        self.log(LogLevel::Info, "Stopping relay...");
        self.render();

        let gateway = self.gateway.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = gateway.stop_relay().await;
            let _ = mailbox.send(ControlMessage::LifecycleCompleted {
                op: LifecycleOp::Stop,
                result,
            });
        });
    }

    fn on_stop_completed(&mut self, result: Result<LifecycleResponse, RelayError>) {
        if self.state.phase != RelayPhase::Stopping {
            debug!(phase = ?self.state.phase, "discarding stale stop result");
            return;
        }

        match result {
            Ok(response) if response.is_stopped() => {
                self.health.disarm();
                self.feed.disarm(RelayPhase::Stopped);
                self.state.online = false;
                self.transition(RelayPhase::Stopped, response.message.clone());
                self.log(
                    LogLevel::Info,
                    format!(
                        "Final stats: {} earned in this session",
                        self.feed.snapshot().earned_label()
                    ),
                );
                self.log(
                    LogLevel::Success,
                    format!("Relay stopped: {}", response.message),
                );
                self.emit_telemetry();
            }
            // The relay may still be up, so the health monitor keeps probing.
            Ok(response) => self.enter_error(
                unexpected_status(RelayCommand::StopRelay, &response),
                LogLevel::Error,
            ),
            Err(err) => self.enter_error(err, LogLevel::Error),
        }

        self.render();
    }

    fn clear_logs(&mut self) {
        let marker = self.logs.clear();
        let _ = self.events.send(ControllerEvent::LogsCleared);
        let _ = self.events.send(ControllerEvent::LogAppended(marker));
        self.render();
    }

    fn open_relay_url(&mut self) {
        let gateway = self.gateway.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = gateway.open_relay_url().await;
            let _ = mailbox.send(ControlMessage::OpenCompleted(result));
        });
    }

    fn on_open_completed(&mut self, result: Result<(), RelayError>) {
        match result {
            Ok(()) => self.log(
                LogLevel::Info,
                format!("Opened http://localhost:{}", self.state.port),
            ),
            Err(err) => {
                warn!(error = %err, "failed to open relay url");
                self.log(LogLevel::Warning, format!("Could not open relay URL: {err}"));
            }
        }
        self.render();
    }

    fn on_health_tick(&mut self, generation: u64) {
        if !self.health.begin_probe(generation) {
            debug!(generation, "skipping health tick");
            return;
        }

        let gateway = self.gateway.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = gateway.health_check().await;
            let _ = mailbox.send(ControlMessage::ProbeCompleted { generation, result });
        });
    }

    fn on_probe_completed(
        &mut self,
        generation: u64,
        result: Result<HealthCheckResponse, RelayError>,
    ) {
        if !self.health.finish_probe(generation) {
            debug!(generation, "discarding stale probe result");
            return;
        }

        match evaluate_probe(self.state.phase, self.state.port, result) {
            ProbeOutcome::Observed { online } => {
                if self.state.online == online {
                    return;
                }
                self.state.online = online;
                self.emit_state();
            }
            ProbeOutcome::Demote(err) => {
                self.state.online = false;
                self.health.disarm();
                self.enter_error(err, LogLevel::Warning);
            }
            ProbeOutcome::Failed(err) => {
                warn!(error = %err, "health probe failed");
                self.log(LogLevel::Warning, format!("Health check failed: {err}"));
            }
        }

        self.render();
    }

    fn on_telemetry_tick(&mut self, generation: u64) {
        if self.state.phase != RelayPhase::Running {
            return;
        }
        if self.feed.tick(generation).is_none() {
            debug!(generation, "discarding stale telemetry tick");
            return;
        }
        self.emit_telemetry();
        self.render();
    }

    fn shutdown(&mut self) {
        self.health.disarm();
        self.feed.disarm(self.state.phase);
        info!("relay controller disposed");
    }

    fn enter_running(&mut self, message: String) {
        self.transition(RelayPhase::Running, message);
        self.health.arm(&self.mailbox, ControlMessage::HealthTick);
        self.feed.begin_session();
        self.feed.arm(&self.mailbox, ControlMessage::TelemetryTick);
        self.emit_telemetry();
    }

    /// Timers other than the telemetry feed are left to the caller.
    fn enter_error(&mut self, err: RelayError, level: LogLevel) {
        warn!(error = %err, phase = ?self.state.phase, "relay entered error state");
        self.feed.disarm(RelayPhase::Error);
        self.state.last_error = Some(err.report());
        self.transition(RelayPhase::Error, err.to_string());
        self.log(level, err.to_string());
        self.emit_telemetry();
    }

    fn transition(&mut self, phase: RelayPhase, message: impl Into<String>) {
        if self.state.phase != phase {
            info!(from = ?self.state.phase, to = ?phase, "relay phase changed");
        }
        self.state.phase = phase;
        self.state.message = message.into();
        if phase != RelayPhase::Error {
            self.state.last_error = None;
        }
        self.emit_state();
    }

    fn log(&mut self, level: LogLevel, text: impl Into<String>) {
        let entry = self.logs.append(level, text);
        let _ = self.events.send(ControllerEvent::LogAppended(entry));
    }

    fn emit_state(&self) {
        let _ = self
            .events
            .send(ControllerEvent::StateChanged(self.state.clone()));
    }

    fn emit_telemetry(&self) {
        let _ = self
            .events
            .send(ControllerEvent::TelemetryUpdated(self.feed.snapshot().clone()));
    }

    fn panel_snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            state: self.state.clone(),
            logs: self.logs.to_vec(),
            telemetry: self.feed.snapshot().clone(),
            health_armed: self.health.is_armed(),
            telemetry_armed: self.feed.is_armed(),
        }
    }

    fn render(&mut self) {
        let snapshot = self.panel_snapshot();
        self.sink.render(&snapshot);
    }
}

fn unexpected_status(command: RelayCommand, response: &LifecycleResponse) -> RelayError {
    RelayError::UnexpectedPayload {
        command,
        detail: format!("status '{}': {}", response.status, response.message),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

use super::*;

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex as StdMutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{NetworkStatus, TelemetrySnapshot},
    error::ErrorCode,
};
use tokio::sync::{Mutex, Notify};

use crate::{
    events::NullSink,
    log_buffer::CLEARED_MARKER,
    telemetry::TelemetryDelta,
};

struct ScriptedGateway {
    responses: Mutex<HashMap<RelayCommand, VecDeque<std::result::Result<Value, String>>>>,
    calls: Mutex<HashMap<RelayCommand, usize>>,
    lifecycle_gate: Option<Arc<Notify>>,
}

impl ScriptedGateway {
    /// Relay not running and nothing listening on the port.
    fn new() -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            RelayCommand::HealthCheck,
            VecDeque::from([Ok(json!({"relay_online": false, "port_accessible": false}))]),
        );
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(HashMap::new()),
            lifecycle_gate: None,
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            lifecycle_gate: Some(gate),
            ..Self::new()
        }
    }

    async fn queue(&self, command: RelayCommand, response: std::result::Result<Value, &str>) {
        self.responses
            .lock()
            .await
            .entry(command)
            .or_default()
            .push_back(response.map_err(str::to_string));
    }

    async fn replace_queue(
        &self,
        command: RelayCommand,
        responses: Vec<std::result::Result<Value, String>>,
    ) {
        self.responses
            .lock()
            .await
            .insert(command, responses.into_iter().collect());
    }

    async fn calls(&self, command: RelayCommand) -> usize {
        self.calls.lock().await.get(&command).copied().unwrap_or(0)
    }

    fn default_response(command: RelayCommand) -> Value {
        match command {
            RelayCommand::StartRelay => json!({"status": "running", "message": "ok"}),
            RelayCommand::StopRelay => {
                json!({"status": "stopped", "message": "Relay stopped successfully"})
            }
            RelayCommand::GetRelayStatus => {
                json!({"running": false, "port": 8080, "message": "Relay status: stopped"})
            }
            RelayCommand::HealthCheck => {
                json!({"relay_online": true, "port_accessible": true, "message": "healthy"})
            }
            RelayCommand::OpenRelayUrl => Value::Null,
        }
    }
}

#[async_trait]
impl CommandGateway for ScriptedGateway {
    async fn invoke(&self, command: RelayCommand, _args: Value) -> Result<Value> {
        *self.calls.lock().await.entry(command).or_default() += 1;

        if matches!(command, RelayCommand::StartRelay | RelayCommand::StopRelay) {
            if let Some(gate) = &self.lifecycle_gate {
                gate.notified().await;
            }
        }

        let scripted = self
            .responses
            .lock()
            .await
            .get_mut(&command)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(anyhow!(err)),
            None => Ok(Self::default_response(command)),
        }
    }
}

struct StepTelemetry {
    ticks: Arc<AtomicUsize>,
}

impl TelemetryStrategy for StepTelemetry {
    fn next_delta(&mut self, _current: &TelemetrySnapshot) -> TelemetryDelta {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        TelemetryDelta {
            earned: 0.000_001,
            new_payments: 1,
            channel_step: 0,
        }
    }
}

struct Harness {
    gateway: Arc<ScriptedGateway>,
    controller: RelayController,
    telemetry_ticks: Arc<AtomicUsize>,
}

impl Harness {
    fn start(gateway: ScriptedGateway) -> Self {
        Self::start_with_sink(gateway, Box::new(NullSink))
    }

    fn start_with_sink(gateway: ScriptedGateway, sink: Box<dyn RenderSink>) -> Self {
        let gateway = Arc::new(gateway);
        let telemetry_ticks = Arc::new(AtomicUsize::new(0));
        let controller = RelayController::start_with_strategy(
            gateway.clone(),
            ControllerSettings::default(),
            Box::new(StepTelemetry {
                ticks: telemetry_ticks.clone(),
            }),
            sink,
        );
        Self {
            gateway,
            controller,
            telemetry_ticks,
        }
    }

    async fn snapshot(&self) -> PanelSnapshot {
        settle().await;
        self.controller.snapshot().await.expect("controller snapshot")
    }

    async fn start_running(&self) -> PanelSnapshot {
        self.controller.request_start();
        let snapshot = self.snapshot().await;
        assert_eq!(snapshot.state.phase, RelayPhase::Running);
        snapshot
    }

    fn telemetry_ticks(&self) -> usize {
        self.telemetry_ticks.load(Ordering::SeqCst)
    }
}

async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}

fn count_level(snapshot: &PanelSnapshot, level: LogLevel) -> usize {
    snapshot
        .logs
        .iter()
        .filter(|entry| entry.level == level)
        .count()
}

#[tokio::test(start_paused = true)]
async fn reconcile_reports_port_occupied_by_another_service() {
    let gateway = ScriptedGateway::new();
    gateway
        .replace_queue(
            RelayCommand::HealthCheck,
            vec![Ok(json!({"relay_online": false, "port_accessible": true}))],
        )
        .await;
    gateway
        .queue(
            RelayCommand::GetRelayStatus,
            Ok(json!({"running": false, "port": 8080, "message": "stopped"})),
        )
        .await;
    let harness = Harness::start(gateway);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Error);
    assert!(snapshot.state.message.contains("port occupied"));
    assert_eq!(
        snapshot.state.last_error.map(|report| report.code),
        Some(ErrorCode::ProbeFailure)
    );
    assert!(!snapshot.health_armed);
    assert!(!snapshot.telemetry_armed);
}

#[tokio::test(start_paused = true)]
async fn reconcile_adopts_a_relay_that_is_already_running() {
    let gateway = ScriptedGateway::new();
    gateway
        .replace_queue(
            RelayCommand::HealthCheck,
            vec![Ok(json!({"relay_online": true, "port_accessible": true}))],
        )
        .await;
    gateway
        .queue(
            RelayCommand::GetRelayStatus,
            Ok(json!({"running": true, "port": 8080, "message": "Relay status: running"})),
        )
        .await;
    let harness = Harness::start(gateway);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Running);
    assert!(snapshot.state.online);
    assert!(snapshot.health_armed);
    assert!(snapshot.telemetry_armed);
    assert_eq!(snapshot.telemetry.network, NetworkStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn reconcile_settles_stopped_when_a_running_relay_is_unreachable() {
    let gateway = ScriptedGateway::new();
    gateway
        .replace_queue(
            RelayCommand::HealthCheck,
            vec![Ok(json!({"relay_online": false, "port_accessible": false}))],
        )
        .await;
    gateway
        .queue(
            RelayCommand::GetRelayStatus,
            Ok(json!({"running": true, "port": 8080, "message": "Relay status: running"})),
        )
        .await;
    let harness = Harness::start(gateway);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Stopped);
    assert!(!snapshot.state.online);
    assert!(snapshot.state.last_error.is_none());
    assert!(!snapshot.health_armed);
    assert!(!snapshot.telemetry_armed);

    advance(Duration::from_secs(30)).await;
    assert_eq!(harness.gateway.calls(RelayCommand::HealthCheck).await, 1);
}

#[tokio::test(start_paused = true)]
async fn reconcile_treats_query_failures_as_stopped() {
    let gateway = ScriptedGateway::new();
    gateway
        .replace_queue(RelayCommand::HealthCheck, vec![Err("host unreachable".into())])
        .await;
    gateway
        .queue(RelayCommand::GetRelayStatus, Err("host unreachable"))
        .await;
    let harness = Harness::start(gateway);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Stopped);
    assert!(!snapshot.state.online);
    assert_eq!(count_level(&snapshot, LogLevel::Warning), 2);
}

#[tokio::test(start_paused = true)]
async fn redundant_requests_are_ignored_while_start_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::start(ScriptedGateway::gated(gate.clone()));

    harness.controller.request_start();
    harness.controller.request_start();
    harness.controller.request_stop();
    harness.controller.request_start();

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Starting);
    assert_eq!(harness.gateway.calls(RelayCommand::StartRelay).await, 1);
    assert_eq!(harness.gateway.calls(RelayCommand::StopRelay).await, 0);

    gate.notify_one();
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Running);
    assert_eq!(harness.gateway.calls(RelayCommand::StartRelay).await, 1);
}

#[tokio::test(start_paused = true)]
async fn redundant_requests_are_ignored_while_stop_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let harness = Harness::start(ScriptedGateway::gated(gate.clone()));

    harness.controller.request_start();
    settle().await;
    gate.notify_one();
    harness.snapshot().await;

    harness.controller.request_stop();
    harness.controller.request_stop();
    harness.controller.request_start();

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Stopping);
    assert_eq!(harness.gateway.calls(RelayCommand::StopRelay).await, 1);
    assert_eq!(harness.gateway.calls(RelayCommand::StartRelay).await, 1);

    gate.notify_one();
    assert_eq!(harness.snapshot().await.state.phase, RelayPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn successful_start_arms_both_timers_exactly_once() {
    let harness = Harness::start(ScriptedGateway::new());
    let snapshot = harness.start_running().await;
    assert!(snapshot.health_armed);
    assert!(snapshot.telemetry_armed);
    assert_eq!(snapshot.state.message, "ok");
    assert_eq!(snapshot.telemetry.channels, 1);

    // One probe was spent on startup reconciliation.
    assert_eq!(harness.gateway.calls(RelayCommand::HealthCheck).await, 1);

    advance(Duration::from_millis(10_500)).await;
    assert_eq!(harness.gateway.calls(RelayCommand::HealthCheck).await, 2);
    assert_eq!(harness.telemetry_ticks(), 10);

    advance(Duration::from_secs(10)).await;
    assert_eq!(harness.gateway.calls(RelayCommand::HealthCheck).await, 3);
    assert_eq!(harness.telemetry_ticks(), 20);

    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Running);
    assert!(snapshot.state.online);
    assert_eq!(snapshot.telemetry.payments, 20);
}

#[tokio::test(start_paused = true)]
async fn successful_stop_disarms_timers_and_no_ticks_follow() {
    let harness = Harness::start(ScriptedGateway::new());
    harness.start_running().await;

    advance(Duration::from_millis(3_500)).await;
    harness.controller.request_stop();
    let stopped = harness.snapshot().await;
    assert_eq!(stopped.state.phase, RelayPhase::Stopped);
    assert!(!stopped.health_armed);
    assert!(!stopped.telemetry_armed);
    assert!(!stopped.state.online);
    assert_eq!(stopped.telemetry.network, NetworkStatus::Disconnected);
    assert_eq!(stopped.telemetry.payments, 3);
    assert!(stopped
        .logs
        .iter()
        .any(|entry| entry.text.starts_with("Final stats:")));

    let probes = harness.gateway.calls(RelayCommand::HealthCheck).await;
    let ticks = harness.telemetry_ticks();
    advance(Duration::from_secs(60)).await;

    let later = harness.snapshot().await;
    assert_eq!(harness.gateway.calls(RelayCommand::HealthCheck).await, probes);
    assert_eq!(harness.telemetry_ticks(), ticks);
    assert_eq!(later.state, stopped.state);
    assert_eq!(later.telemetry, stopped.telemetry);
}

#[tokio::test(start_paused = true)]
async fn stop_while_stopped_makes_no_gateway_call() {
    let harness = Harness::start(ScriptedGateway::new());
    let before = harness.snapshot().await;

    harness.controller.request_stop();
    let after = harness.snapshot().await;

    assert_eq!(harness.gateway.calls(RelayCommand::StopRelay).await, 0);
    assert_eq!(after.state, before.state);
    assert_eq!(after.logs, before.logs);
}

#[tokio::test(start_paused = true)]
async fn earned_grows_while_running_and_freezes_afterwards() {
    let harness = Harness::start(ScriptedGateway::new());
    harness.start_running().await;

    let mut last = 0.0;
    for _ in 0..5 {
        advance(Duration::from_secs(1)).await;
        let earned = harness.snapshot().await.telemetry.earned;
        assert!(earned >= last);
        last = earned;
    }
    assert!(last > 0.0);

    harness.controller.request_stop();
    let frozen = harness.snapshot().await.telemetry.earned;
    advance(Duration::from_secs(5)).await;
    assert_eq!(harness.snapshot().await.telemetry.earned, frozen);
}

#[tokio::test(start_paused = true)]
async fn offline_probe_demotes_running_relay_with_one_warning() {
    let harness = Harness::start(ScriptedGateway::new());
    harness.start_running().await;
    harness
        .gateway
        .queue(
            RelayCommand::HealthCheck,
            Ok(json!({"relay_online": false, "port_accessible": false})),
        )
        .await;

    advance(Duration::from_millis(10_500)).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Error);
    assert!(!snapshot.state.online);
    assert!(!snapshot.telemetry_armed);
    assert!(!snapshot.health_armed);
    assert_eq!(snapshot.telemetry.network, NetworkStatus::Error);
    assert_eq!(count_level(&snapshot, LogLevel::Warning), 1);

    let probes = harness.gateway.calls(RelayCommand::HealthCheck).await;
    let ticks = harness.telemetry_ticks();
    advance(Duration::from_secs(60)).await;
    assert_eq!(harness.gateway.calls(RelayCommand::HealthCheck).await, probes);
    assert_eq!(harness.telemetry_ticks(), ticks);
}

#[tokio::test(start_paused = true)]
async fn probe_transport_failure_is_logged_but_not_fatal() {
    let harness = Harness::start(ScriptedGateway::new());
    harness.start_running().await;
    harness
        .gateway
        .queue(RelayCommand::HealthCheck, Err("probe timed out"))
        .await;

    advance(Duration::from_millis(10_500)).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Running);
    assert!(snapshot.health_armed);
    assert!(snapshot.telemetry_armed);
    let warnings: Vec<_> = snapshot
        .logs
        .iter()
        .filter(|entry| entry.level == LogLevel::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].text.starts_with("Health check failed"));
}

#[tokio::test(start_paused = true)]
async fn rejected_start_enters_error_and_can_be_retried() {
    let gateway = ScriptedGateway::new();
    gateway
        .queue(RelayCommand::StartRelay, Err("docker not found"))
        .await;
    let harness = Harness::start(gateway);

    harness.controller.request_start();
    let failed = harness.snapshot().await;
    assert_eq!(failed.state.phase, RelayPhase::Error);
    assert!(failed.state.message.contains("docker not found"));
    assert_eq!(
        failed.state.last_error.map(|report| report.code),
        Some(ErrorCode::CommandRejected)
    );
    assert!(!failed.health_armed);
    assert!(!failed.telemetry_armed);
    assert_eq!(failed.telemetry.network, NetworkStatus::Error);

    harness.start_running().await;
    assert_eq!(harness.gateway.calls(RelayCommand::StartRelay).await, 2);
    assert!(harness.snapshot().await.state.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn non_running_start_status_is_an_unexpected_payload() {
    let gateway = ScriptedGateway::new();
    gateway
        .queue(
            RelayCommand::StartRelay,
            Ok(json!({"status": "starting", "message": "pulling image"})),
        )
        .await;
    let harness = Harness::start(gateway);

    harness.controller.request_start();
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Error);
    assert!(snapshot.state.message.contains("pulling image"));
    assert_eq!(
        snapshot.state.last_error.map(|report| report.code),
        Some(ErrorCode::UnexpectedPayload)
    );
    assert!(!snapshot.health_armed);
}

#[tokio::test(start_paused = true)]
async fn failed_stop_keeps_probing_and_allows_another_stop() {
    let harness = Harness::start(ScriptedGateway::new());
    harness.start_running().await;
    harness
        .gateway
        .queue(RelayCommand::StopRelay, Err("kill failed"))
        .await;

    harness.controller.request_stop();
    let failed = harness.snapshot().await;
    assert_eq!(failed.state.phase, RelayPhase::Error);
    assert!(failed.health_armed);
    assert!(!failed.telemetry_armed);
    assert_eq!(failed.telemetry.network, NetworkStatus::Error);

    let probes = harness.gateway.calls(RelayCommand::HealthCheck).await;
    advance(Duration::from_millis(10_500)).await;
    assert_eq!(
        harness.gateway.calls(RelayCommand::HealthCheck).await,
        probes + 1
    );
    assert_eq!(harness.snapshot().await.state.phase, RelayPhase::Error);

    harness.controller.request_stop();
    let stopped = harness.snapshot().await;
    assert_eq!(stopped.state.phase, RelayPhase::Stopped);
    assert!(!stopped.health_armed);
}

#[tokio::test(start_paused = true)]
async fn clear_logs_leaves_only_the_marker() {
    let harness = Harness::start(ScriptedGateway::new());
    harness.start_running().await;
    assert!(harness.snapshot().await.logs.len() > 1);

    harness.controller.clear_logs();
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.logs.len(), 1);
    assert_eq!(snapshot.logs[0].text, CLEARED_MARKER);
}

#[tokio::test(start_paused = true)]
async fn activity_log_stays_bounded_across_many_cycles() {
    let harness = Harness::start(ScriptedGateway::new());
    for _ in 0..10 {
        harness.start_running().await;
        harness.controller.request_stop();
        assert_eq!(harness.snapshot().await.state.phase, RelayPhase::Stopped);
    }
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.logs.len(), 15);
    assert!(snapshot.logs[14].text.starts_with("Relay stopped"));
}

#[tokio::test(start_paused = true)]
async fn open_url_failure_is_logged_without_phase_change() {
    let gateway = ScriptedGateway::new();
    gateway
        .queue(RelayCommand::OpenRelayUrl, Err("no browser"))
        .await;
    let harness = Harness::start(gateway);

    harness.controller.open_relay_url();
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.state.phase, RelayPhase::Stopped);
    assert!(snapshot
        .logs
        .last()
        .is_some_and(|entry| entry.text.starts_with("Could not open relay URL")));
}

#[tokio::test(start_paused = true)]
async fn events_and_sink_follow_the_transition_order() {
    let rendered = Arc::new(StdMutex::new(Vec::new()));
    let sink_rendered = rendered.clone();
    let sink = move |snapshot: &PanelSnapshot| {
        if let Ok(mut phases) = sink_rendered.lock() {
            phases.push(snapshot.state.phase);
        }
    };
    let harness = Harness::start_with_sink(ScriptedGateway::new(), Box::new(sink));
    let mut events = harness.controller.subscribe_events();

    harness.start_running().await;

    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::StateChanged(state) = event {
            phases.push(state.phase);
        }
    }
    assert_eq!(
        phases,
        vec![RelayPhase::Stopped, RelayPhase::Starting, RelayPhase::Running]
    );

    let rendered = rendered.lock().expect("rendered phases").clone();
    assert_eq!(
        rendered,
        vec![RelayPhase::Stopped, RelayPhase::Starting, RelayPhase::Running]
    );
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_all_timers() {
    let harness = Harness::start(ScriptedGateway::new());
    harness.start_running().await;

    let Harness {
        gateway,
        controller,
        telemetry_ticks,
    } = harness;
    controller.dispose().await;

    let probes = gateway.calls(RelayCommand::HealthCheck).await;
    let ticks = telemetry_ticks.load(Ordering::SeqCst);
    advance(Duration::from_secs(60)).await;
    assert_eq!(gateway.calls(RelayCommand::HealthCheck).await, probes);
    assert_eq!(telemetry_ticks.load(Ordering::SeqCst), ticks);
}

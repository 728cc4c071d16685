mod console;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use relay_control::{
    CommandGateway, RelayController, SeededRandom, SimulatedTelemetry, TelemetryStrategy,
};
use relay_host::{
    config::{load_settings_from, settings_path},
    LocalRelayHost,
};
use serde_json::Value;
use shared::protocol::{
    HealthCheckResponse, LifecycleResponse, RelayCommand, RelayStatusResponse,
};
use tracing_subscriber::EnvFilter;

use crate::console::ConsoleSink;

const SETTLE_WAIT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "relayctl", about = "Manage a local NOSTR relay from the command line")]
struct Args {
    /// Settings file to use instead of the default search locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured relay port.
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Print raw command payloads as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Whether the relay process or container is running.
    Status,
    /// Probe the relay port and its NIP-11 document.
    Health,
    /// Start the relay (Docker first, local binary as fallback).
    Start,
    /// Stop the relay.
    Stop,
    /// Open the relay page in the default browser.
    Open,
    /// Run the lifecycle controller and print its activity until interrupted.
    Watch {
        /// Request a start as soon as the controller is up.
        #[arg(long)]
        start: bool,
        /// Stop the relay before exiting.
        #[arg(long)]
        stop_on_exit: bool,
        /// Exit after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Seed the simulated telemetry so a session can be replayed.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings_from(args.config.clone().or_else(settings_path).as_deref());
    if let Some(port) = args.port {
        settings.controller.relay_port = port;
    }
    let host = Arc::new(LocalRelayHost::from_settings(&settings));

    match args.command {
        Command::Status => {
            let payload = invoke(&host, RelayCommand::GetRelayStatus, args.json).await?;
            if !args.json {
                let status: RelayStatusResponse = serde_json::from_value(payload)?;
                println!("{} (port {})", status.message, status.port);
            }
        }
        Command::Health => {
            let payload = invoke(&host, RelayCommand::HealthCheck, args.json).await?;
            if !args.json {
                let health: HealthCheckResponse = serde_json::from_value(payload)?;
                println!(
                    "online: {}, port accessible: {} - {}",
                    health.relay_online, health.port_accessible, health.message
                );
            }
        }
        Command::Start => {
            let response = start_persistent(&host).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.message);
            }
        }
        Command::Stop => {
            let payload = invoke(&host, RelayCommand::StopRelay, args.json).await?;
            let response: LifecycleResponse = serde_json::from_value(payload)?;
            if !args.json {
                println!("{}", response.message);
            }
        }
        Command::Open => {
            invoke(&host, RelayCommand::OpenRelayUrl, false).await?;
            println!("Opened {}", host.relay_url());
        }
        Command::Watch {
            start,
            stop_on_exit,
            duration_secs,
            seed,
        } => {
            watch(
                host,
                settings.controller,
                WatchOptions {
                    start,
                    stop_on_exit,
                    duration: duration_secs.map(Duration::from_secs),
                    seed,
                },
            )
            .await?;
        }
    }

    Ok(())
}

async fn invoke(host: &LocalRelayHost, command: RelayCommand, print_json: bool) -> Result<Value> {
    let payload = host.invoke(command, Value::Null).await?;
    if print_json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(payload)
}

struct WatchOptions {
    start: bool,
    stop_on_exit: bool,
    duration: Option<Duration>,
    seed: Option<u64>,
}

fn telemetry_strategy(seed: Option<u64>) -> Box<dyn TelemetryStrategy> {
    match seed {
        Some(seed) => Box::new(SimulatedTelemetry::new(SeededRandom::new(seed))),
        None => Box::new(SimulatedTelemetry::from_entropy()),
    }
}

/// Starts a relay that keeps running after relayctl exits. A local binary is a
/// child of this process, so that fallback is torn down again and refused.
async fn start_persistent(host: &LocalRelayHost) -> Result<LifecycleResponse> {
    let response = host.start_relay().await?;
    if !response.is_running() {
        bail!("relay reported status '{}'", response.status);
    }
    if host.runs_locally().await {
        host.stop_relay().await?;
        bail!(
            "Docker is unavailable and a local relay would exit with relayctl; \
             use `relayctl watch --start` to run it in the foreground"
        );
    }
    Ok(response)
}

async fn watch(
    host: Arc<LocalRelayHost>,
    settings: relay_control::ControllerSettings,
    options: WatchOptions,
) -> Result<()> {
    let controller = RelayController::start_with_strategy(
        host,
        settings,
        telemetry_strategy(options.seed),
        Box::new(ConsoleSink::new()),
    );
    if options.start {
        controller.request_start();
    }

    match options.duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => tokio::signal::ctrl_c().await?,
    }

    if options.stop_on_exit {
        wait_until_settled(&controller).await?;
        controller.request_stop();
        wait_until_settled(&controller).await?;
    }

    let final_snapshot = controller.snapshot().await?;
    println!(
        "{} | earned {} | payments {} | channels {}",
        final_snapshot.state.phase.label(),
        final_snapshot.telemetry.earned_label(),
        final_snapshot.telemetry.payments,
        final_snapshot.telemetry.channels
    );
    controller.dispose().await;
    Ok(())
}

/// Waits until no lifecycle command is outstanding.
async fn wait_until_settled(controller: &RelayController) -> Result<()> {
    let deadline = tokio::time::Instant::now() + SETTLE_WAIT;
    loop {
        let phase = controller.snapshot().await?.state.phase;
        if !phase.is_transitional() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("relay still {} after {:?}", phase.label(), SETTLE_WAIT);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn watch_flags_parse() {
        let args = Args::parse_from([
            "relayctl",
            "--port",
            "7447",
            "watch",
            "--start",
            "--duration-secs",
            "5",
            "--seed",
            "42",
        ]);
        assert_eq!(args.port, Some(7447));
        match args.command {
            Command::Watch {
                start,
                stop_on_exit,
                duration_secs,
                seed,
            } => {
                assert!(start);
                assert!(!stop_on_exit);
                assert_eq!(duration_secs, Some(5));
                assert_eq!(seed, Some(42));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_refuses_a_relay_that_would_die_with_the_cli() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("relayctl_start_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("scratch dir");
        let script = dir.join("fake-relay.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");

        let host = LocalRelayHost::new(
            8080,
            relay_host::HostSettings {
                data_dir: dir.join("data"),
                docker_program: "/nonexistent/relayctl-tests/docker".into(),
                binary_candidates: vec![script.display().to_string()],
                ..relay_host::HostSettings::default()
            },
        );

        let err = start_persistent(&host).await.expect_err("local fallback refused");
        assert!(err.to_string().contains("relayctl watch --start"));
        assert!(!host.runs_locally().await);
        assert!(!host.relay_status().await.running);

        std::fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn seeded_telemetry_replays_the_same_session() {
        let current = shared::domain::TelemetrySnapshot::default();
        let mut first = telemetry_strategy(Some(42));
        let mut second = telemetry_strategy(Some(42));
        for _ in 0..20 {
            assert_eq!(first.next_delta(&current), second.next_delta(&current));
        }
    }
}

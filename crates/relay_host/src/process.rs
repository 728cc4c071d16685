//! Launching and tearing down nostr-rs-relay, in a Docker container or as a
//! local child process.

use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
};

use tokio::{
    fs,
    process::{Child, Command},
};
use tracing::{debug, info};

use crate::{config::HostSettings, error::HostError};

const CONTAINER_PORT: u16 = 8080;
const CONTAINER_DB_DIR: &str = "/usr/src/app/db";
const CONTAINER_CONFIG_PATH: &str = "/usr/src/app/config.toml";
const CONTAINER_CONFIG_FILE: &str = "config.toml";
const LOCAL_CONFIG_FILE: &str = "local-config.toml";
const LOCAL_RELAY_LOG_FILTER: &str = "warn,nostr_rs_relay=info";

pub(crate) enum RunningRelay {
    Container,
    Local(Child),
}

/// nostr-rs-relay configuration listening on `port` and storing events in `data_directory`.
pub fn relay_config(port: u16, data_directory: &str) -> String {
    format!(
        r#"[info]
relay_url = "ws://localhost:{port}/"
name = "Privacy Lion Relay"
description = "Privacy Lion NOSTR Relay - Empowering Data Freedom"

[database]
data_directory = "{data_directory}"

[network]
port = {port}
address = "0.0.0.0"

[limits]
max_event_bytes = 65536
max_ws_message_bytes = 131072
"#
    )
}

pub(crate) struct RelayLauncher {
    port: u16,
    settings: HostSettings,
}

impl RelayLauncher {
    pub fn new(port: u16, settings: HostSettings) -> Self {
        Self { port, settings }
    }

    pub async fn start_container(&self) -> Result<(), HostError> {
        let data_dir = self.prepare_data_dir().await?;
        let config_path = data_dir.join(CONTAINER_CONFIG_FILE);
        write_config(&config_path, &relay_config(CONTAINER_PORT, CONTAINER_DB_DIR)).await?;

        // A stopped container with the same name would make `docker run` fail.
        if let Err(err) = self
            .docker("rm", &["rm", "-f", &self.settings.container_name])
            .await
        {
            debug!(error = %err, "no stale relay container removed");
        }

        let publish = format!("{}:{CONTAINER_PORT}", self.port);
        let db_mount = format!("src={},target={CONTAINER_DB_DIR},type=bind", data_dir.display());
        let config_mount = format!(
            "src={},target={CONTAINER_CONFIG_PATH},type=bind",
            config_path.display()
        );
        self.docker(
            "run",
            &[
                "run",
                "-d",
                "--name",
                &self.settings.container_name,
                "-p",
                &publish,
                "--mount",
                &db_mount,
                "--mount",
                &config_mount,
                "--restart",
                "unless-stopped",
                "--pull",
                "always",
                &self.settings.relay_image,
            ],
        )
        .await?;

        info!(
            container = %self.settings.container_name,
            image = %self.settings.relay_image,
            port = self.port,
            "relay container started"
        );
        Ok(())
    }

    pub async fn start_local(&self) -> Result<Child, HostError> {
        let binary = self.find_binary().ok_or(HostError::BinaryNotFound)?;
        let data_dir = self.prepare_data_dir().await?;
        let config_path = data_dir.join(LOCAL_CONFIG_FILE);
        write_config(
            &config_path,
            &relay_config(self.port, &data_dir.to_string_lossy()),
        )
        .await?;

        let child = Command::new(&binary)
            .arg("--db")
            .arg(&data_dir)
            .arg("--config")
            .arg(&config_path)
            .env("RUST_LOG", LOCAL_RELAY_LOG_FILTER)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HostError::Spawn {
                program: binary.display().to_string(),
                source,
            })?;

        info!(binary = %binary.display(), pid = ?child.id(), "local relay started");
        Ok(child)
    }

    /// `None` when the container does not exist or Docker is unavailable.
    pub async fn container_running(&self) -> Option<bool> {
        let output = self
            .docker(
                "inspect",
                &[
                    "inspect",
                    "-f",
                    "{{.State.Running}}",
                    &self.settings.container_name,
                ],
            )
            .await
            .ok()?;
        Some(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    /// Stops and removes the relay container. `false` when there was none.
    pub async fn remove_container(&self) -> Result<bool, HostError> {
        if self.container_running().await.is_none() {
            return Ok(false);
        }

        let name = self.settings.container_name.as_str();
        self.docker("stop", &["stop", name])
            .await
            .map_err(|err| HostError::StopFailed(err.to_string()))?;
        self.docker("rm", &["rm", name])
            .await
            .map_err(|err| HostError::StopFailed(err.to_string()))?;
        info!(container = name, "relay container removed");
        Ok(true)
    }

    fn find_binary(&self) -> Option<PathBuf> {
        self.settings.binary_candidates.iter().find_map(|candidate| {
            let path = Path::new(candidate);
            if path.is_file() {
                Some(path.to_path_buf())
            } else {
                which::which(candidate).ok()
            }
        })
    }

    async fn prepare_data_dir(&self) -> Result<PathBuf, HostError> {
        let path = &self.settings.data_dir;
        let to_error = |source| HostError::DataDir {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(path).await.map_err(to_error)?;
        // Docker bind mounts need absolute paths.
        fs::canonicalize(path).await.map_err(to_error)
    }

    async fn docker(&self, action: &'static str, args: &[&str]) -> Result<Output, HostError> {
        let program = &self.settings.docker_program;
        debug!(action, "running docker");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| HostError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(HostError::CommandFailed {
                program: program.clone(),
                action,
                detail: describe_failure(&output),
            });
        }
        Ok(output)
    }
}

async fn write_config(path: &Path, contents: &str) -> Result<(), HostError> {
    fs::write(path, contents)
        .await
        .map_err(|source| HostError::DataDir {
            path: path.to_path_buf(),
            source,
        })
}

fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        output.status.to_string()
    } else {
        format!("{}: {stderr}", output.status)
    }
}

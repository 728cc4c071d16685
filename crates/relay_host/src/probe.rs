use std::time::Duration;

use anyhow::Result;
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use shared::protocol::HealthCheckResponse;
use tokio::{net::TcpStream, time};
use tracing::debug;

pub const NIP11_MEDIA_TYPE: &str = "application/nostr+json";

/// NIP-11 relay information document. Only the fields we report on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayInfo {
    pub name: Option<String>,
    pub software: Option<String>,
    pub version: Option<String>,
    pub supported_nips: Vec<u32>,
}

pub struct HealthProbe {
    port: u16,
    timeout: Duration,
    http: Client,
}

impl HealthProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { port, timeout, http }
    }

    pub async fn check(&self) -> HealthCheckResponse {
        let port = self.port;
        if !self.port_accessible().await {
            return HealthCheckResponse {
                relay_online: false,
                port_accessible: false,
                message: format!("Relay not accessible on port {port}"),
            };
        }

        match self.relay_info().await {
            Ok(info) => {
                debug!(
                    port,
                    software = info.software.as_deref().unwrap_or("unknown"),
                    version = info.version.as_deref().unwrap_or("unknown"),
                    nips = ?info.supported_nips,
                    "relay answered NIP-11"
                );
                HealthCheckResponse {
                    relay_online: true,
                    port_accessible: true,
                    message: match info.name {
                        Some(name) => format!("{name} is healthy on port {port}"),
                        None => format!("NOSTR relay is healthy on port {port}"),
                    },
                }
            }
            Err(err) => {
                debug!(port, error = %format!("{err:#}"), "port answered without relay information");
                HealthCheckResponse {
                    relay_online: false,
                    port_accessible: true,
                    message: format!("Port {port} is in use but did not answer as a NOSTR relay"),
                }
            }
        }
    }

    pub async fn port_accessible(&self) -> bool {
        matches!(
            time::timeout(self.timeout, TcpStream::connect(("127.0.0.1", self.port))).await,
            Ok(Ok(_))
        )
    }

    pub async fn relay_info(&self) -> Result<RelayInfo> {
        let info = self
            .http
            .get(format!("http://127.0.0.1:{}/", self.port))
            .header(ACCEPT, NIP11_MEDIA_TYPE)
            .send()
            .await?
            .error_for_status()?
            .json::<RelayInfo>()
            .await?;
        Ok(info)
    }
}

#[cfg(test)]
#[path = "tests/probe_tests.rs"]
mod tests;

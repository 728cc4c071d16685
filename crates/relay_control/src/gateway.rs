//! Typed access to the opaque command-invocation boundary of the relay host.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::protocol::{
    HealthCheckResponse, LifecycleResponse, RelayCommand, RelayStatusResponse,
};
use tracing::debug;

use crate::error::RelayError;

/// Raw invoke capability: one command name, optional arguments, a JSON payload back.
///
/// Implementations must not retry; callers own the retry policy.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    async fn invoke(&self, command: RelayCommand, args: Value) -> Result<Value>;
}

#[derive(Clone)]
pub struct RelayGateway {
    inner: Arc<dyn CommandGateway>,
}

impl RelayGateway {
    pub fn new(inner: Arc<dyn CommandGateway>) -> Self {
        Self { inner }
    }

    pub async fn start_relay(&self) -> Result<LifecycleResponse, RelayError> {
        self.call(RelayCommand::StartRelay).await
    }

    pub async fn stop_relay(&self) -> Result<LifecycleResponse, RelayError> {
        self.call(RelayCommand::StopRelay).await
    }

    pub async fn get_relay_status(&self) -> Result<RelayStatusResponse, RelayError> {
        self.call(RelayCommand::GetRelayStatus).await
    }

    pub async fn health_check(&self) -> Result<HealthCheckResponse, RelayError> {
        self.call(RelayCommand::HealthCheck).await
    }

    /// Fire-and-forget: whatever payload comes back is ignored.
    pub async fn open_relay_url(&self) -> Result<(), RelayError> {
        self.invoke_raw(RelayCommand::OpenRelayUrl).await.map(|_| ())
    }

    async fn call<T: DeserializeOwned>(&self, command: RelayCommand) -> Result<T, RelayError> {
        let payload = self.invoke_raw(command).await?;
        serde_json::from_value(payload).map_err(|err| RelayError::UnexpectedPayload {
            command,
            detail: err.to_string(),
        })
    }

    async fn invoke_raw(&self, command: RelayCommand) -> Result<Value, RelayError> {
        debug!(command = %command, "invoking relay command");
        self.inner
            .invoke(command, Value::Null)
            .await
            .map_err(|err| RelayError::CommandRejected {
                command,
                reason: format!("{err:#}"),
            })
    }
}

use shared::{
    error::{ErrorCode, ErrorReport},
    protocol::RelayCommand,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("{command} failed: {reason}")]
    CommandRejected {
        command: RelayCommand,
        reason: String,
    },
    #[error("unexpected {command} response: {detail}")]
    UnexpectedPayload {
        command: RelayCommand,
        detail: String,
    },
    #[error("{detail}")]
    ProbeFailure { detail: String },
    #[error("relay controller is no longer running")]
    ControllerClosed,
}

impl RelayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CommandRejected { .. } | Self::ControllerClosed => ErrorCode::CommandRejected,
            Self::UnexpectedPayload { .. } => ErrorCode::UnexpectedPayload,
            Self::ProbeFailure { .. } => ErrorCode::ProbeFailure,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.code(), self.to_string())
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    CommandRejected,
    UnexpectedPayload,
    ProbeFailure,
}

impl ErrorCode {
    pub fn label(self) -> &'static str {
        match self {
            Self::CommandRejected => "Command rejected",
            Self::UnexpectedPayload => "Unexpected response",
            Self::ProbeFailure => "Health probe failure",
        }
    }
}

/// Last failure surfaced to renderers alongside the `Error` phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Failed to start relay: {0}")]
    StartFailed(String),
    #[error("Failed to stop relay: {0}")]
    StopFailed(String),
    #[error("nostr-rs-relay binary not found")]
    BinaryNotFound,
    #[error("failed to prepare relay data directory '{path}': {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} {action} exited with {detail}")]
    CommandFailed {
        program: String,
        action: &'static str,
        detail: String,
    },
    #[error("could not open {url}: {detail}")]
    Opener { url: String, detail: String },
}

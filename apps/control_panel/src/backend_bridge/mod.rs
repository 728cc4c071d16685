//! Bridge between the UI thread and the tokio runtime hosting the relay controller.

pub mod commands;
pub mod runtime;
pub mod snapshot_slot;

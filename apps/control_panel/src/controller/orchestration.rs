//! Command orchestration from UI actions to the backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::PanelCommand;

/// Queues `cmd` without blocking the frame. Failures are reported through `status`.
pub fn dispatch_panel_command(
    cmd_tx: &Sender<PanelCommand>,
    cmd: PanelCommand,
    status: &mut Option<String>,
) {
    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd.name(), "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = Some("UI command queue is full; please retry".to_string());
        }
        Err(TrySendError::Disconnected(_)) => {
            *status = Some(
                "Backend worker disconnected (possible startup/runtime failure); restart the panel"
                    .to_string(),
            );
        }
    }
}

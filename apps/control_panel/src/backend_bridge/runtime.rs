//! Backend worker: owns the tokio runtime, the local relay host and the controller.

use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender};
use relay_control::RelayController;
use relay_host::{LocalRelayHost, OperatorSettings};
use shared::domain::PanelSnapshot;

use crate::backend_bridge::{commands::PanelCommand, snapshot_slot::SnapshotSlot};
use crate::controller::events::UiEvent;

/// Runs until every command sender is dropped, then disposes the controller.
pub fn launch(
    cmd_rx: Receiver<PanelCommand>,
    ui_tx: Sender<UiEvent>,
    snapshots: SnapshotSlot,
    settings: OperatorSettings,
) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::BackendFailed(format!(
                    "backend worker startup failure: failed to build runtime: {err}"
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        let host = Arc::new(LocalRelayHost::from_settings(&settings));
        let sink = move |snapshot: &PanelSnapshot| snapshots.publish(snapshot.clone());

        let controller = {
            let _guard = runtime.enter();
            RelayController::start(host, settings.controller, Box::new(sink))
        };
        let _ = ui_tx.try_send(UiEvent::BackendReady);

        while let Ok(command) = cmd_rx.recv() {
            tracing::debug!(command = command.name(), "applying panel command");
            match command {
                PanelCommand::StartRelay => controller.request_start(),
                PanelCommand::StopRelay => controller.request_stop(),
                PanelCommand::ClearLogs => controller.clear_logs(),
                PanelCommand::OpenRelayUrl => controller.open_relay_url(),
            }
        }

        runtime.block_on(controller.dispose());
        tracing::info!("backend worker stopped");
    });
}

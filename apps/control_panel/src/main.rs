use std::path::PathBuf;

mod backend_bridge;
mod controller;
mod ui;

use clap::Parser;
use crossbeam_channel::bounded;
use eframe::egui;
use relay_host::config::{load_settings_from, settings_path};
use tracing_subscriber::EnvFilter;

use crate::{
    backend_bridge::{commands::PanelCommand, snapshot_slot::SnapshotSlot},
    controller::events::UiEvent,
    ui::RelayPanelApp,
};

#[derive(Debug, Parser)]
#[command(name = "control_panel", about = "Desktop control panel for a local NOSTR relay")]
struct Args {
    /// Settings file to use instead of the default search locations.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = load_settings_from(args.config.or_else(settings_path).as_deref());
    let port = settings.controller.relay_port;

    let (cmd_tx, cmd_rx) = bounded::<PanelCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(16);
    let snapshots = SnapshotSlot::new();
    backend_bridge::runtime::launch(cmd_rx, ui_tx, snapshots.clone(), settings);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Privacy Lion Relay Operator")
            .with_inner_size([960.0, 720.0])
            .with_min_inner_size([720.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Privacy Lion Relay Operator",
        options,
        Box::new(move |_cc| Ok(Box::new(RelayPanelApp::new(cmd_tx, ui_rx, snapshots, port)))),
    )
}

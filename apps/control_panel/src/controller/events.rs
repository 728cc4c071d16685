/// Events delivered from the backend worker to the UI thread.
///
/// Panel snapshots travel through [`SnapshotSlot`](crate::backend_bridge::snapshot_slot::SnapshotSlot)
/// instead, so only the newest one is ever shown.
pub enum UiEvent {
    BackendReady,
    BackendFailed(String),
}

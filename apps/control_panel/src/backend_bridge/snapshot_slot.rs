//! Latest-wins hand-off of panel snapshots from the backend worker to the UI thread.

use std::sync::{Arc, Mutex, PoisonError};

use shared::domain::PanelSnapshot;

/// Holds only the newest snapshot. Every snapshot is a complete view, so a
/// publish overwrites whatever the UI has not picked up yet.
#[derive(Clone, Default)]
pub struct SnapshotSlot {
    latest: Arc<Mutex<Option<PanelSnapshot>>>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: PanelSnapshot) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    pub fn take(&self) -> Option<PanelSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

//! UI layer: the single relay panel window.

pub mod app;

pub use app::RelayPanelApp;

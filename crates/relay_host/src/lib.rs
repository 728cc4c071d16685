//! Local relay host: runs nostr-rs-relay in Docker, or from a local binary
//! when Docker is unavailable, and answers the relay command vocabulary.

pub mod config;
pub mod error;
mod host;
mod opener;
pub mod probe;
mod process;

pub use config::{load_settings, load_settings_from, HostSettings, OperatorSettings};
pub use error::HostError;
pub use host::LocalRelayHost;
pub use probe::{HealthProbe, RelayInfo};
pub use process::relay_config;

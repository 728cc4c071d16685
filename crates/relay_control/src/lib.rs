//! Client-side lifecycle controller for a locally hosted relay.
//!
//! The controller reconciles user intent (start/stop), asynchronous command
//! results, periodic health probes and simulated telemetry into one panel
//! snapshot that any renderer can draw.

pub mod config;
mod controller;
pub mod error;
pub mod events;
pub mod gateway;
mod health;
pub mod log_buffer;
pub mod telemetry;
mod timer;

pub use config::ControllerSettings;
pub use controller::RelayController;
pub use error::RelayError;
pub use events::{ControllerEvent, NullSink, RenderSink};
pub use gateway::{CommandGateway, RelayGateway};
pub use log_buffer::LogBuffer;
pub use telemetry::{
    RandomSource, SeededRandom, SimulatedTelemetry, SystemRandom, TelemetryDelta,
    TelemetryStrategy,
};

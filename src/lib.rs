//! # Propulsion Supervisor
//!
//! Supervisor for an underwater vehicle's propulsion board: four thrusters and
//! four servos driven by pulse widths, a power-enable line, and a small bank of
//! analog sensors, all commanded by a host computer over a byte link.
//!
//! ## Key Architecture
//! - **Supervisor:** three-state lifecycle (`Initializing`, `Suspended`,
//!   `Running`) guarding every actuator write.
//! - **Sensor cache:** background sampler keeps the latest snapshot so a host
//!   read never waits on the ADC.
//! - **Watchdog:** forces `Suspended` when the host stops sending headers.
//! - **Dispatcher:** one header byte at a time, payload length implied.
//!
//! ## Concurrency
//! - One mutex serializes lifecycle transitions and driver access.
//! - Wake-up completion is a compare-and-set on (state, sequence), so a stale
//!   wake-up never promotes the board.
//! - Telemetry events go through a bounded lock-free queue; producers never block.

pub mod config;
pub mod error;
pub mod inputs;
pub mod link;
pub mod outputs;
pub mod utils;
pub mod watchdog;

pub use config::{LinkConfig, SupervisorConfig};
pub use error::{Error, Result};
pub use inputs::{cache::SensorCache, sampler::SamplerTask, sensor::SensorSnapshot};
pub use link::dispatcher::{Dispatcher, Poll};
pub use link::protocol::Header;
pub use outputs::{actuator::PulseCommand, state::LifecycleState, supervisor::Supervisor};
pub use utils::telemetry::{Telemetry, TelemetryEvent};
pub use watchdog::{Feeder, Watchdog};

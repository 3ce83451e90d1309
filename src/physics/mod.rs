//! Ground-truth battery, thermal, and load-disturbance simulation.

/// Open-circuit voltage curve and charge bookkeeping.
pub mod battery;
/// Seeded load spike process.
pub mod disturbance;
pub mod engine;
/// Lumped thermal model.
pub mod thermal;
pub mod types;

// Re-export the main types for convenience
pub use battery::{BatteryState, OcvCurve};
pub use disturbance::{DisturbanceEvent, DisturbanceProcess};
pub use engine::{LoadModel, PhysicsEngine, SensorNoise};
pub use thermal::ThermalModel;
pub use types::{Observation, SensorReading, TrueState};

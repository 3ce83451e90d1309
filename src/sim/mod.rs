/// Tick counter for the run loop.
pub mod clock;
pub mod controller;
/// Service request traces.
pub mod demand;
pub mod engine;
pub mod kpi;
/// The three-layer adaptive controller.
pub mod naheo;
/// Daily activity windows.
pub mod schedule;
pub mod types;

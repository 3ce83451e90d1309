//! Energy-aware controller comparison on a battery-powered device twin.
//!
//! A [`physics::PhysicsEngine`] stands in for the hardware. Each configured
//! algorithm drives its own copy of it through [`sim::engine::Engine`], and
//! [`runner::run_comparison`] collects the per-algorithm reports.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
/// Estimator, learner, execution layer, and safety guardian.
pub mod control;
pub mod error;
pub mod forecast;
pub mod io;
pub mod physics;
pub mod reporting;
pub mod runner;
/// Simulation engine, controllers, demand, and metrics.
pub mod sim;
pub mod telemetry;

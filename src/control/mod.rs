//! The three control layers: virtual sensing, strategy, and execution.

pub mod estimator;
pub mod execution;
/// Override path that bypasses the optimizer when limits are exceeded.
pub mod guardian;
pub mod learner;

pub use estimator::{Estimate, Estimator, EstimatorParams, Measurement};
pub use execution::{ComputeState, ControlCommand, ExecutionInput, ExecutionLayer, ExecutionParams};
pub use guardian::{GuardianParams, SafetyGuardian, Violation};
pub use learner::{Learner, LearnerMode, LearnerParams, ScarcityPenalty, Selection, ValueTable};

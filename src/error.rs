//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by scenario setup, simulation, and export.
#[derive(Debug, Error)]
pub enum SimError {
    /// The pack ran out of charge. Fatal to the run that hit it.
    #[error("battery exhausted at tick {tick}")]
    BatteryExhausted { tick: usize },

    /// Scenario setup rejected the configuration.
    #[error("{} invalid configuration field(s): {}", .0.len(), join_errors(.0))]
    Config(Vec<ConfigError>),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        Self::Config(vec![e])
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

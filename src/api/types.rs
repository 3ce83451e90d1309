//! API query and error types.

use serde::{Deserialize, Serialize};

/// Optional range query parameters for the telemetry endpoint.
#[derive(Debug, Deserialize)]
pub struct TelemetryQuery {
    /// First tick (inclusive).
    pub from: Option<usize>,
    /// Last tick (inclusive).
    pub to: Option<usize>,
}

impl TelemetryQuery {
    /// Inclusive tick bounds, or a message if they are inverted.
    pub fn bounds(&self) -> Result<(usize, usize), String> {
        let from = self.from.unwrap_or(0);
        let to = self.to.unwrap_or(usize::MAX);
        if from > to {
            return Err(format!("`from` ({from}) must be <= `to` ({to})"));
        }
        Ok((from, to))
    }
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

use thiserror::Error;

use crate::sim::ShapeKind;

/// Errors surfaced by the simulation and its configuration layer.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("panel dimensions {width} x {height} are outside the accepted range [200, 2000]")]
    InvalidDimensions { width: f64, height: f64 },
    #[error("{kind} count cannot be negative (got {value})")]
    NegativeCount { kind: ShapeKind, value: i64 },
    #[error("{kind} count {value} exceeds the limit of {limit}")]
    CountTooLarge { kind: ShapeKind, value: i64, limit: u32 },
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

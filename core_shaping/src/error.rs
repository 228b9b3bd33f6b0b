use shaping_schema::{GameVariable, SnapshotError};
use thiserror::Error;

use crate::config::ShapingConfigError;
use crate::shaper::ShaperPhase;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapingError {
    #[error("`{operation}` is not allowed while the shaper is {phase}")]
    Lifecycle {
        operation: &'static str,
        phase: ShaperPhase,
    },
    #[error("event vector has width {actual}, expected {expected}")]
    EventWidthMismatch { expected: usize, actual: usize },
    #[error("snapshot is missing game variable {0}")]
    MissingVariable(GameVariable),
    #[error("snapshot contains unknown game variable {0:?}")]
    UnknownVariable(String),
    #[error("snapshot has {actual} values, schema expects {expected}")]
    SnapshotLength { expected: usize, actual: usize },
    #[error("invalid heat matrix size {rows}x{cols}")]
    InvalidHeatMatrixSize { rows: usize, cols: usize },
    #[error("event buffer needs a capacity of at least 1 and a positive clip, got capacity {capacity} and clip {event_clip}")]
    InvalidEventBuffer { capacity: usize, event_clip: f64 },
    #[error("invalid shaping config: {0}")]
    InvalidConfig(String),
}

impl From<SnapshotError> for ShapingError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::MissingVariable(variable) => ShapingError::MissingVariable(variable),
            SnapshotError::UnknownVariable(name) => ShapingError::UnknownVariable(name),
            SnapshotError::Length { expected, actual } => {
                ShapingError::SnapshotLength { expected, actual }
            }
        }
    }
}

impl From<ShapingConfigError> for ShapingError {
    fn from(err: ShapingConfigError) -> Self {
        match err {
            ShapingConfigError::Invalid(reason) => ShapingError::InvalidConfig(reason),
            other => ShapingError::InvalidConfig(other.to_string()),
        }
    }
}

pub type ShapingResult<T> = Result<T, ShapingError>;

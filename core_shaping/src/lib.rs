//! Rarity-of-events reward shaping for first-person-shooter environments.
//!
//! Game telemetry arrives once per step as a [`VariableSnapshot`]. The
//! [`RewardShaper`] turns consecutive snapshots into discrete events, keeps
//! per-episode event totals in a rolling [`EventBuffer`], and pays an intrinsic
//! reward that grows as an event becomes rarer across recent episodes.

pub mod auxiliary;
pub mod config;
mod error;
pub mod event_buffer;
pub mod events;
pub mod position_buffer;
pub mod replay;
mod shaper;
pub mod statistics;

pub use shaping_schema::{GameVariable, TraceRecord, VariableSnapshot};

pub use auxiliary::{AuxiliaryShaping, BotsAuxiliaryShaping};
pub use config::{
    load_shaping_config_from_env, AuxiliaryPolicy, DetectorConfig, EventBufferConfig,
    HeatMatrixConfig, PositionBufferConfig, RewardMode, ShapingConfig, ShapingConfigError,
    ShapingConfigMetadata,
};
pub use error::{ShapingError, ShapingResult};
pub use event_buffer::{EventBuffer, EventBufferHandle, SharedEventBuffer};
pub use events::{DetectorKind, EventDetector, EventVector, KillSlotMapping};
pub use position_buffer::{HeatMatrix, PositionBuffer};
pub use replay::{replay_trace, ReplayError, ReplayOptions, ReplayReport};
pub use shaper::{RewardShaper, ShaperPhase, ShaperPool};
pub use statistics::ShapingStatistics;

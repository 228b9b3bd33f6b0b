//! Configuration for the reward-shaping core.
//!
//! Loaded from `shaping_config.json` with support for an environment variable
//! override.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{DetectorKind, KillSlotMapping};
use crate::position_buffer::MAX_HEAT_MATRIX_CELLS;

pub const BUILTIN_SHAPING_CONFIG: &str = include_str!("data/shaping_config.json");

/// Environment variable naming an alternative config file.
pub const SHAPING_CONFIG_PATH_VAR: &str = "SHAPING_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingConfig {
    pub reward_mode: RewardMode,
    pub detector: DetectorConfig,
    pub event_buffer: EventBufferConfig,
    pub position_buffer: PositionBufferConfig,
    pub auxiliary: AuxiliaryPolicy,
    pub heat_matrix: HeatMatrixConfig,
}

impl ShapingConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_SHAPING_CONFIG)
                .expect("builtin shaping config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ShapingConfigError> {
        let config: ShapingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ShapingConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ShapingConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ShapingConfig::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ShapingConfigError> {
        if self.event_buffer.capacity == 0 {
            return Err(ShapingConfigError::Invalid(
                "event_buffer.capacity must be at least 1".into(),
            ));
        }
        if !(self.event_buffer.event_clip > 0.0) {
            return Err(ShapingConfigError::Invalid(format!(
                "event_buffer.event_clip must be positive, got {}",
                self.event_buffer.event_clip
            )));
        }
        if self.position_buffer.buffer_size == 0 {
            return Err(ShapingConfigError::Invalid(
                "position_buffer.buffer_size must be at least 1".into(),
            ));
        }
        if !(self.detector.movement_threshold >= 0.0) {
            return Err(ShapingConfigError::Invalid(format!(
                "detector.movement_threshold must be non-negative, got {}",
                self.detector.movement_threshold
            )));
        }
        let cells = self.heat_matrix.rows.checked_mul(self.heat_matrix.cols);
        if !cells.is_some_and(|cells| (1..=MAX_HEAT_MATRIX_CELLS).contains(&cells)) {
            return Err(ShapingConfigError::Invalid(format!(
                "heat_matrix must have between 1 and {MAX_HEAT_MATRIX_CELLS} cells, got {}x{}",
                self.heat_matrix.rows, self.heat_matrix.cols
            )));
        }
        Ok(())
    }
}

/// How the intrinsic term is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    /// Rarity-weighted intrinsic reward from the event buffer.
    #[default]
    Rarity,
    /// Intrinsic reward is always zero; events are still tracked.
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    pub kill_slots: KillSlotMapping,
    pub movement_threshold: f64,
    pub suppress_on_death: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::default(),
            kill_slots: KillSlotMapping::default(),
            movement_threshold: 1.0,
            suppress_on_death: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBufferConfig {
    pub capacity: usize,
    pub event_clip: f64,
    /// Pool one buffer across every shaper built by a [`crate::ShaperPool`].
    pub shared: bool,
}

impl Default for EventBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            event_clip: 0.01,
            shared: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionBufferConfig {
    pub buffer_size: usize,
}

impl Default for PositionBufferConfig {
    fn default() -> Self {
        Self { buffer_size: 12_800 }
    }
}

/// Extra shaping term layered on top of the event reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryPolicy {
    #[default]
    None,
    /// +1 per kill, -1 per death; for matches against scripted bots.
    Bots,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatMatrixConfig {
    pub rows: usize,
    pub cols: usize,
}

impl Default for HeatMatrixConfig {
    fn default() -> Self {
        Self { rows: 64, cols: 64 }
    }
}

impl HeatMatrixConfig {
    pub fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

#[derive(Debug, Error)]
pub enum ShapingConfigError {
    #[error("failed to parse shaping config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read shaping config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid shaping config: {0}")]
    Invalid(String),
}

/// Metadata about where the active configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ShapingConfigMetadata {
    path: Option<PathBuf>,
}

impl ShapingConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn is_builtin(&self) -> bool {
        self.path.is_none()
    }
}

/// Load shaping configuration from `SHAPING_CONFIG_PATH` when set, otherwise
/// from the crate's data file. Falls back to the builtin copy when that file
/// cannot be read or is invalid.
pub fn load_shaping_config_from_env() -> (Arc<ShapingConfig>, ShapingConfigMetadata) {
    let path = env::var(SHAPING_CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/shaping_config.json")
        });

    match ShapingConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "roe_shaping::config",
                path = %path.display(),
                "shaping_config.loaded=file"
            );
            (Arc::new(config), ShapingConfigMetadata::new(Some(path)))
        }
        Err(err) => {
            tracing::warn!(
                target: "roe_shaping::config",
                path = %path.display(),
                error = %err,
                "shaping_config.load_failed"
            );
            tracing::info!(
                target: "roe_shaping::config",
                "shaping_config.loaded=builtin"
            );
            (ShapingConfig::builtin(), ShapingConfigMetadata::new(None))
        }
    }
}

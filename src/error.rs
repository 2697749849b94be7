//! Error types.
//!
//! Only configuration can fail. The per-tick pipeline degrades locally
//! (skipped tick, skipped write, zero contribution) and never returns an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fixed_timestep must be finite and positive, got {0}")]
    InvalidTimestep(f32),
    #[error("{field} must be finite and non-negative, got {value}")]
    InvalidDistance { field: &'static str, value: f32 },
    #[error("lod_high_distance ({high}) must not exceed lod_medium_distance ({medium})")]
    LodThresholdOrder { high: f32, medium: f32 },
    #[error("min_cell_size must be finite and positive, got {0}")]
    InvalidCellSize(f32),
    #[error("parallel_batch_size must be non-zero")]
    ZeroBatchSize,
    #[error("max_substeps_per_step must be non-zero")]
    ZeroSubsteps,
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

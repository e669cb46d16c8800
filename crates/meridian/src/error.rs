//! Top-level error type for the Meridian facade.

use meridian_config::ConfigError;
use meridian_sim::SimError;
use meridian_types::TimeError;
use thiserror::Error;

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, MeridianError>;

#[derive(Debug, Error)]
pub enum MeridianError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Time(#[from] TimeError),

    /// Merging the configuration sources failed.
    #[error(transparent)]
    Load(#[from] anyhow::Error),
}

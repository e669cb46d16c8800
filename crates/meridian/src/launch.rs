//! Building a ready-to-register [`SuperScheduler`] from configuration.

use std::path::Path;

use meridian_config::{ConfigLoader, MeridianConfig};
use meridian_sim::SuperScheduler;
use tracing::debug;

use crate::Result;

/// Loads every configuration source for `project_dir` and builds the
/// scheduler it describes.
pub fn scheduler_from_project(project_dir: impl AsRef<Path>) -> Result<SuperScheduler> {
    scheduler_from_loader(ConfigLoader::new().with_project_dir(project_dir))
}

/// Builds a scheduler from an explicitly set up loader, e.g. one skipping
/// the user's config file.
pub fn scheduler_from_loader(loader: ConfigLoader) -> Result<SuperScheduler> {
    let config = loader.load()?;
    scheduler_from_config(&config)
}

/// Builds a scheduler from a single inline TOML document.
pub fn scheduler_from_toml(source: &str) -> Result<SuperScheduler> {
    let config = MeridianConfig::from_toml_str(source)?;
    scheduler_from_config(&config)
}

pub fn scheduler_from_config(config: &MeridianConfig) -> Result<SuperScheduler> {
    let scheduler = SuperScheduler::from_config(config)?;
    debug!(
        name = scheduler.name(),
        mode = ?scheduler.config().mode,
        horizon = ?scheduler.config().horizon,
        max_events = ?scheduler.config().max_events,
        "scheduler configured"
    );
    Ok(scheduler)
}

//! Configuration management for Meridian
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (MERIDIAN_* prefix, `__` between sections)
//! 2. meridian.local.toml (gitignored, local overrides)
//! 3. meridian.toml (git-tracked, project config)
//! 4. ~/.config/meridian/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use meridian_types::TimeUnit;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

pub use meridian_types::ExecutionMode;

/// Main Meridian configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeridianConfig {
    pub simulation: SimulationSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Name attached to the run's log spans.
    pub name: String,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            name: "meridian-simulation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub mode: ExecutionMode,
    /// Last virtual time that may be dispatched, e.g. `"500"` (internal ticks)
    /// or `"60 s"`.
    pub horizon: Option<String>,
    /// Maximum number of main-loop iterations.
    pub max_events: Option<u64>,
}

impl SchedulerSettings {
    /// Parses the horizon into internal ticks.
    pub fn horizon_ticks(&self) -> Result<Option<i64>, ConfigError> {
        self.horizon
            .as_deref()
            .map(|raw| {
                TimeUnit::parse_time(raw)
                    .map_err(|e| ConfigError::ValidationError(format!("scheduler.horizon: {e}")))
            })
            .transpose()
    }

    /// Checks settings that deserialize fine but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(horizon) = self.horizon_ticks()? {
            if horizon < 0 {
                return Err(ConfigError::ValidationError(format!(
                    "scheduler.horizon must not be negative, got {horizon}"
                )));
            }
        }
        if self.max_events == Some(0) {
            return Err(ConfigError::ValidationError(
                "scheduler.max_events must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl MeridianConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML document, without any other source.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::ParseError {
            path: "<inline>".into(),
            source: e,
        })?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML, e.g. to seed a project file.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::MergeError(e.to_string()))
    }

    /// A configuration that keeps everything on the scheduler thread.
    pub fn synchronous() -> Self {
        Self {
            scheduler: SchedulerSettings {
                mode: ExecutionMode::Synchronous,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config() {
        let config = MeridianConfig::default();
        assert_eq!(config.simulation.name, "meridian-simulation");
        assert_eq!(config.scheduler.mode, ExecutionMode::Asynchronous);
        assert!(config.scheduler.horizon.is_none());
        assert!(config.scheduler.max_events.is_none());
    }

    #[test]
    fn test_synchronous_config() {
        let config = MeridianConfig::synchronous();
        assert_eq!(config.scheduler.mode, ExecutionMode::Synchronous);
    }

    #[test_case(None, None ; "no horizon")]
    #[test_case(Some("250"), Some(250) ; "ticks")]
    #[test_case(Some("2 ms"), Some(2_000_000_000) ; "with unit")]
    fn test_horizon_ticks(raw: Option<&str>, expected: Option<i64>) {
        let settings = SchedulerSettings {
            horizon: raw.map(str::to_string),
            ..Default::default()
        };
        assert_eq!(settings.horizon_ticks().unwrap(), expected);
    }

    #[test]
    fn test_invalid_horizon_rejected() {
        let settings = SchedulerSettings {
            horizon: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::ValidationError(_))));

        let negative = SchedulerSettings {
            horizon: Some("-5".to_string()),
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_zero_max_events_rejected() {
        let settings = SchedulerSettings {
            max_events: Some(0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_toml_str() {
        let config = MeridianConfig::from_toml_str(
            r#"
[simulation]
name = "bank-queue"

[scheduler]
mode = "synchronous"
horizon = "10 s"
max_events = 5000
"#,
        )
        .expect("valid toml");

        assert_eq!(config.simulation.name, "bank-queue");
        assert_eq!(config.scheduler.mode, ExecutionMode::Synchronous);
        assert_eq!(config.scheduler.max_events, Some(5000));
        assert_eq!(
            config.scheduler.horizon_ticks().unwrap(),
            Some(10_000_000_000_000)
        );
    }

    #[test]
    fn test_from_toml_str_reports_parse_errors() {
        let err = MeridianConfig::from_toml_str("[scheduler]\nmode = \"sideways\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = MeridianConfig::default();
        config.scheduler.horizon = Some("3 ms".to_string());
        let rendered = config.to_toml_string().unwrap();
        let parsed = MeridianConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.scheduler.horizon.as_deref(), Some("3 ms"));
    }
}

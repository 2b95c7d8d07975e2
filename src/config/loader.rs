//! Configuration loading.
//!
//! Merge order, lowest to highest precedence: built-in defaults, an
//! optional configuration file, `FMV_TRACKER__*` environment variables
//! (`__` separates sections, e.g. `FMV_TRACKER__RESOLUTION__CURRENT_USER_ID`).

use super::TrackerConfig;
use crate::error::{Result, TrackerError};
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

impl TrackerConfig {
    /// Load configuration with the default file lookup (`fmv-tracker.*` in
    /// the working directory, optional).
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an explicit file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&TrackerConfig::default())
            .map_err(|e| TrackerError::Configuration(format!("defaults failed to encode: {e}")))?;

        let mut builder = Config::builder().add_source(defaults);
        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("fmv-tracker").required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix("FMV_TRACKER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let merged = builder
            .build()
            .map_err(|e| TrackerError::Configuration(e.to_string()))?;
        let config: TrackerConfig = merged
            .try_deserialize()
            .map_err(|e| TrackerError::Configuration(e.to_string()))?;

        config.validate()?;
        debug!(
            canonical_context = %config.scheduler.canonical_context_id,
            day_key_offset_minutes = config.storage.day_key_utc_offset_minutes,
            "configuration loaded"
        );
        Ok(config)
    }
}

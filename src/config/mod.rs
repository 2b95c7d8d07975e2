//! # Tracker Configuration
//!
//! Explicit, validated configuration for every component. Values come from
//! an optional `fmv-tracker` file (TOML/YAML/JSON, whatever the `config`
//! crate recognizes) merged over the documented defaults, with
//! `FMV_TRACKER__*` environment variables taking final precedence.

pub mod loader;

use serde::{Deserialize, Serialize};

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Fixed UTC offset, in minutes, used to derive day keys. Replaces
    /// ambient machine time so every context sharing a store shards
    /// identically. `0` = UTC; `-300` buckets like US Eastern standard
    /// time.
    pub day_key_utc_offset_minutes: i32,
    /// Maximum scan-journal lines kept per day; older lines are dropped.
    pub journal_max_lines: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            day_key_utc_offset_minutes: 0,
            journal_max_lines: 500,
        }
    }
}

/// Gateway client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Origin used when a raffle carries no gateway origin of its own.
    pub fallback_origin: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            fallback_origin: None,
            timeout_ms: 15_000,
        }
    }
}

/// Resolution engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// The user the claim policies act for. Empty disables claiming.
    pub current_user_id: String,
    /// Pause between candidates within one scan, in milliseconds.
    pub throttle_delay_ms: u64,
    /// Default pause between raffles of a manual action run.
    pub manual_delay_ms: u64,
    /// Enable the solo-participant winner inference fallback.
    pub infer_solo_winner: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            current_user_id: String::new(),
            throttle_delay_ms: 750,
            manual_delay_ms: 1_500,
            infer_solo_winner: true,
        }
    }
}

/// Scheduler and loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// This context's identifier. Unset generates a random one, which can
    /// never match the canonical identifier: an unconfigured context is a
    /// passive reader.
    pub context_id: Option<String>,
    /// The identifier of the sole context allowed to run the loops.
    pub canonical_context_id: String,
    pub discovery_enabled: bool,
    pub discovery_interval_seconds: u64,
    pub resolution_enabled: bool,
    pub resolution_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            context_id: None,
            canonical_context_id: "fmv-tracker-primary".to_string(),
            discovery_enabled: true,
            discovery_interval_seconds: 1_800,
            resolution_enabled: true,
            resolution_interval_seconds: 900,
        }
    }
}

/// Invariant auditor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Minimum seconds between audit passes.
    pub cooldown_seconds: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 300,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub resolution: ResolutionConfig,
    pub scheduler: SchedulerConfig,
    pub audit: AuditConfig,
}

impl TrackerConfig {
    /// Validate cross-field constraints after merging all sources.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::TrackerError;

        if self.scheduler.canonical_context_id.trim().is_empty() {
            return Err(TrackerError::Configuration(
                "scheduler.canonical_context_id must not be empty".into(),
            ));
        }
        if self.scheduler.discovery_interval_seconds == 0 {
            return Err(TrackerError::Configuration(
                "scheduler.discovery_interval_seconds must be positive".into(),
            ));
        }
        if self.scheduler.resolution_interval_seconds == 0 {
            return Err(TrackerError::Configuration(
                "scheduler.resolution_interval_seconds must be positive".into(),
            ));
        }
        if self.api.timeout_ms == 0 {
            return Err(TrackerError::Configuration(
                "api.timeout_ms must be positive".into(),
            ));
        }
        // A day is 1440 minutes; offsets beyond that cannot mean anything.
        if self.storage.day_key_utc_offset_minutes.abs() > 14 * 60 {
            return Err(TrackerError::Configuration(
                "storage.day_key_utc_offset_minutes outside the valid UTC offset range".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_canonical_context_is_rejected() {
        let mut config = TrackerConfig::default();
        config.scheduler.canonical_context_id = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let mut config = TrackerConfig::default();
        config.scheduler.resolution_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_absurd_offset_is_rejected() {
        let mut config = TrackerConfig::default();
        config.storage.day_key_utc_offset_minutes = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_deserializes_over_defaults() {
        let parsed: TrackerConfig =
            serde_json::from_str(r#"{"resolution":{"current_user_id":"u_1"}}"#).unwrap();
        assert_eq!(parsed.resolution.current_user_id, "u_1");
        assert_eq!(parsed.resolution.throttle_delay_ms, 750);
    }
}

//! Runtime configuration.
//!
//! Defaults are tuned for the demo scene. Each batching and synchronization
//! knob can be overridden through an environment variable so a run can be
//! reshaped without recompiling:
//!
//! | Variable | Field |
//! |---|---|
//! | `BATCHER_MAX_TRIANGLES` | [`EngineConfig::max_triangles_per_batch`] |
//! | `BATCHER_MAX_OBJECTS` | [`EngineConfig::max_objects_per_batch`] |
//! | `BATCHER_FENCE_TIMEOUT_MS` | [`EngineConfig::fence_timeout`] |
//! | `BATCHER_VALIDATION` | [`EngineConfig::enable_validation`] |

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default triangle capacity of one batch.
pub const DEFAULT_MAX_TRIANGLES: u32 = 500;

/// Default number of distinct object transforms in one batch.
pub const DEFAULT_MAX_OBJECTS: u32 = 32;

/// Default upper bound for a single fence wait.
pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_MAX_TRIANGLES: &str = "BATCHER_MAX_TRIANGLES";
pub const ENV_MAX_OBJECTS: &str = "BATCHER_MAX_OBJECTS";
pub const ENV_FENCE_TIMEOUT_MS: &str = "BATCHER_FENCE_TIMEOUT_MS";
pub const ENV_VALIDATION: &str = "BATCHER_VALIDATION";

/// Engine and window configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Triangles accumulated before a batch is flushed.
    pub max_triangles_per_batch: u32,
    /// Object transforms accumulated before a batch is flushed.
    pub max_objects_per_batch: u32,
    /// Longest time a frame fence may be waited on before the GPU is
    /// considered hung.
    pub fence_timeout: Duration,
    /// Enables the Khronos validation layer.
    pub enable_validation: bool,
    /// Initial window width in pixels.
    pub window_width: u32,
    /// Initial window height in pixels.
    pub window_height: u32,
    /// Window title.
    pub window_title: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_triangles_per_batch: DEFAULT_MAX_TRIANGLES,
            max_objects_per_batch: DEFAULT_MAX_OBJECTS,
            fence_timeout: DEFAULT_FENCE_TIMEOUT,
            enable_validation: cfg!(debug_assertions),
            window_width: 1280,
            window_height: 720,
            window_title: "Batcher".to_string(),
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from defaults and process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a variable is set but cannot be parsed,
    /// or when the resulting configuration fails [`EngineConfig::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration using `lookup` in place of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = parse_var::<u32, _>(&lookup, ENV_MAX_TRIANGLES)? {
            config.max_triangles_per_batch = value;
        }
        if let Some(value) = parse_var::<u32, _>(&lookup, ENV_MAX_OBJECTS)? {
            config.max_objects_per_batch = value;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_FENCE_TIMEOUT_MS)? {
            config.fence_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_VALIDATION) {
            config.enable_validation = parse_flag(ENV_VALIDATION, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    ///
    /// Zero batch sizes are never clamped to a minimum.
    pub fn validate(&self) -> Result<()> {
        if self.max_triangles_per_batch == 0 {
            return Err(Error::Config(
                "max triangles per batch must be greater than 0".to_string(),
            ));
        }
        if self.max_objects_per_batch == 0 {
            return Err(Error::Config(
                "max objects per batch must be greater than 0".to_string(),
            ));
        }
        if self.fence_timeout.is_zero() {
            return Err(Error::Config(
                "fence timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}={raw:?}: {e}"))),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(Error::Config(format!("{key}={raw:?}: expected a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.max_triangles_per_batch, 500);
        assert_eq!(config.max_objects_per_batch, 32);
        assert_eq!(config.fence_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_MAX_TRIANGLES, "1000"),
            (ENV_MAX_OBJECTS, " 64 "),
            (ENV_FENCE_TIMEOUT_MS, "250"),
            (ENV_VALIDATION, "off"),
        ]))
        .unwrap();

        assert_eq!(config.max_triangles_per_batch, 1000);
        assert_eq!(config.max_objects_per_batch, 64);
        assert_eq!(config.fence_timeout, Duration::from_millis(250));
        assert!(!config.enable_validation);
    }

    #[test]
    fn test_unparsable_value_is_error() {
        let result = EngineConfig::from_lookup(lookup_from(&[(ENV_MAX_TRIANGLES, "lots")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_negative_value_is_error() {
        let result = EngineConfig::from_lookup(lookup_from(&[(ENV_MAX_OBJECTS, "-4")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = EngineConfig::from_lookup(lookup_from(&[(ENV_MAX_TRIANGLES, "0")]));
        assert!(matches!(result, Err(Error::Config(_))));

        let config = EngineConfig {
            max_objects_per_batch: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_flag() {
        let result = EngineConfig::from_lookup(lookup_from(&[(ENV_VALIDATION, "maybe")]));
        assert!(result.is_err());
    }
}

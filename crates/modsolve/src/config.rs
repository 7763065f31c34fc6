use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default amount subtracted from every optional candidate's weight
pub const DEFAULT_INCLUSION_BIAS: i64 = 1000;

/// Tuning knobs for a resolution.
///
/// Loaded from the environment with [`ResolverConfig::from_env`] or from a
/// config file by the CLI; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolverConfig {
    /// Subtracted from optional candidate weights so that loading a mod is
    /// preferred over leaving it out
    pub inclusion_bias: i64,
    /// Wall-clock budget of a resolution in milliseconds, shared by every
    /// backend call from the first one on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Shrink unsatisfiable cores before reporting them
    pub minimize_cores: bool,
    /// Stop error decomposition after this many errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reported_errors: Option<usize>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            inclusion_bias: DEFAULT_INCLUSION_BIAS,
            timeout_ms: None,
            minimize_cores: true,
            max_reported_errors: None,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `MODSOLVE_*` environment variables
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Overlay `MODSOLVE_*` environment variables onto this config.
    ///
    /// Empty variables are ignored; unparseable ones are logged and ignored.
    pub fn merge_env(mut self) -> Self {
        if let Some(ms) = parse_env::<u64>("MODSOLVE_TIMEOUT_MS") {
            self.timeout_ms = Some(ms);
        }
        if let Some(bias) = parse_env::<i64>("MODSOLVE_INCLUSION_BIAS") {
            self.inclusion_bias = bias;
        }
        if let Some(value) = get_env("MODSOLVE_MINIMIZE_CORES") {
            match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.minimize_cores = true,
                "0" | "false" | "no" | "off" => self.minimize_cores = false,
                other => log::warn!("Ignoring MODSOLVE_MINIMIZE_CORES={}", other),
            }
        }
        if let Some(max) = parse_env::<usize>("MODSOLVE_MAX_ERRORS") {
            self.max_reported_errors = Some(max);
        }
        self
    }

    /// Set the timeout for each backend call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    /// Set the inclusion bias
    pub fn inclusion_bias(mut self, bias: i64) -> Self {
        self.inclusion_bias = bias;
        self
    }

    /// Enable or disable core minimization
    pub fn minimize_cores(mut self, minimize: bool) -> Self {
        self.minimize_cores = minimize;
        self
    }

    /// Limit the number of reported errors
    pub fn max_reported_errors(mut self, max: usize) -> Self {
        self.max_reported_errors = Some(max);
        self
    }

    /// The configured timeout, if any
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn get_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|s| !s.is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T> {
    let value = get_env(var)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::warn!("Ignoring {}={}: not a valid number", var, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.inclusion_bias, 1000);
        assert_eq!(config.timeout_duration(), None);
        assert!(config.minimize_cores);
        assert_eq!(config.max_reported_errors, None);
    }

    #[test]
    fn test_builder() {
        let config = ResolverConfig::new()
            .timeout(Duration::from_secs(2))
            .inclusion_bias(10)
            .minimize_cores(false)
            .max_reported_errors(3);

        assert_eq!(config.timeout_ms, Some(2000));
        assert_eq!(config.inclusion_bias, 10);
        assert!(!config.minimize_cores);
        assert_eq!(config.max_reported_errors, Some(3));
    }

    #[test]
    fn test_merge_env() {
        env::set_var("MODSOLVE_TIMEOUT_MS", "250");
        env::set_var("MODSOLVE_INCLUSION_BIAS", "");
        env::set_var("MODSOLVE_MINIMIZE_CORES", "off");
        env::set_var("MODSOLVE_MAX_ERRORS", "many");

        let config = ResolverConfig::from_env();

        env::remove_var("MODSOLVE_TIMEOUT_MS");
        env::remove_var("MODSOLVE_INCLUSION_BIAS");
        env::remove_var("MODSOLVE_MINIMIZE_CORES");
        env::remove_var("MODSOLVE_MAX_ERRORS");

        assert_eq!(config.timeout_duration(), Some(Duration::from_millis(250)));
        assert_eq!(config.inclusion_bias, DEFAULT_INCLUSION_BIAS);
        assert!(!config.minimize_cores);
        assert_eq!(config.max_reported_errors, None);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"timeout-ms": 50, "minimize-cores": false}"#).unwrap();
        assert_eq!(config.timeout_ms, Some(50));
        assert!(!config.minimize_cores);
        assert_eq!(config.inclusion_bias, DEFAULT_INCLUSION_BIAS);
    }
}

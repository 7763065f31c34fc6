//! Configuration file support (modsolve.toml)

use anyhow::{Context, Result};
use modsolve::ResolverConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file searched for
pub const CONFIG_FILE: &str = "modsolve.toml";

/// Root structure of modsolve.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModsolveConfig {
    /// Resolver tuning
    pub resolver: ResolverConfig,
}

impl ModsolveConfig {
    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Find modsolve.toml by searching upward from `start_dir`
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut current = start_dir.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Resolve the effective resolver configuration.
    ///
    /// An explicit path must exist; otherwise modsolve.toml is searched
    /// upward from the current directory. Environment variables are applied
    /// on top of the file.
    pub fn resolve(explicit: Option<&Path>) -> Result<ResolverConfig> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find(&std::env::current_dir()?),
        };

        let config = match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Self::load_file(&path)?
            }
            None => Self::default(),
        };

        Ok(config.resolver.merge_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config() {
        let config: ModsolveConfig = toml::from_str("").unwrap();
        assert_eq!(config.resolver, ResolverConfig::default());
    }

    #[test]
    fn test_parse_resolver_section() {
        let toml = r#"
[resolver]
inclusion-bias = 50
timeout-ms = 250
minimize-cores = false
max-reported-errors = 3
"#;
        let config: ModsolveConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.resolver.inclusion_bias, 50);
        assert_eq!(config.resolver.timeout_ms, Some(250));
        assert!(!config.resolver.minimize_cores);
        assert_eq!(config.resolver.max_reported_errors, Some(3));
    }

    #[test]
    fn test_find_searches_upward() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE), "[resolver]\ninclusion-bias = 7\n").unwrap();

        let found = ModsolveConfig::find(&nested).unwrap();
        assert_eq!(found, temp_dir.path().join(CONFIG_FILE));

        let config = ModsolveConfig::load_file(&found).unwrap();
        assert_eq!(config.resolver.inclusion_bias, 7);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[resolver]\ninclusion-bias = \"high\"\n").unwrap();

        let err = ModsolveConfig::load_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert!(ModsolveConfig::resolve(Some(&missing)).is_err());
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Errors that can occur when loading or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the default path to the configuration file.
    ///
    /// Uses `~/.config/searchgate/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("searchgate").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// A missing file yields `Config::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    /// Reads, parses and validates the config at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - search bounds are ordered (`min <= default <= max`)
    /// - the health check path is absolute
    /// - every repository has a name and url
    pub fn validate(&self) -> Result<(), ConfigError> {
        let search = &self.search;
        if search.min_limit > search.max_limit {
            return Err(validation(format!(
                "search.min_limit ({}) exceeds search.max_limit ({})",
                search.min_limit, search.max_limit
            )));
        }
        if search.default_limit < search.min_limit || search.default_limit > search.max_limit {
            return Err(validation(format!(
                "search.default_limit ({}) must lie within [{}, {}]",
                search.default_limit, search.min_limit, search.max_limit
            )));
        }
        if search.default_context > search.max_context {
            return Err(validation(format!(
                "search.default_context ({}) exceeds search.max_context ({})",
                search.default_context, search.max_context
            )));
        }

        if !self.server.health_check_uri.starts_with('/') {
            return Err(validation(format!(
                "server.health_check_uri '{}' must start with '/'",
                self.server.health_check_uri
            )));
        }

        for (name, repo) in &self.repos {
            if name.trim().is_empty() {
                return Err(validation("repository names must not be empty".to_string()));
            }
            if repo.url.trim().is_empty() {
                return Err(validation(format!("repository '{}' has no url", name)));
            }
        }

        Ok(())
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::ValidationError { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoConfig;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_applies_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[server]
bind_addr = "127.0.0.1:9000"

[repos.alpha]
url = "file:///srv/alpha"
ref = "main"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.server.health_check_uri, "/healthz");
        assert_eq!(config.search.max_context, 20);

        let alpha = &config.repos["alpha"];
        assert_eq!(alpha.reference.as_deref(), Some("main"));
        assert_eq!(alpha.vcs, "git");
        assert!(alpha.enable_push_updates);
    }

    #[test]
    fn test_parse_error_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        fs::write(&path, "[server\nbind_addr = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let mut config = Config::default();
        config.search.min_limit = 10;
        config.search.max_limit = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_default_context_above_max() {
        let mut config = Config::default();
        config.search.default_context = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_health_uri() {
        let mut config = Config::default();
        config.server.health_check_uri = "healthz".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_repo_without_url() {
        let mut config = Config::default();
        config.repos.insert("empty".to_string(), RepoConfig::new(""));
        assert!(config.validate().is_err());
    }
}

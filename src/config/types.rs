use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchLimits,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Registered repositories keyed by name.
    #[serde(default)]
    pub repos: BTreeMap<String, RepoConfig>,
}

/// Listener and filesystem settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the gateway (host:port).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Path answered in every serving state, ready or not.
    #[serde(default = "default_health_check_uri")]
    pub health_check_uri: String,
    /// Root for repository checkouts and the user store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Optional directory of static front-end assets.
    #[serde(default)]
    pub ui_dir: Option<PathBuf>,
}

/// Server-side bounds applied to search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLimits {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_min_limit")]
    pub min_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    #[serde(default = "default_context")]
    pub default_context: u32,
    #[serde(default = "default_max_context")]
    pub max_context: u32,
}

/// Token and credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Signing secret. Random per process when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

/// Configuration snapshot for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Source location (`file://` path, absolute path, or remote url).
    pub url: String,
    #[serde(default = "default_vcs")]
    pub vcs: String,
    /// Branch or ref to serve.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Exclusion rules, as regular expressions over repository-relative paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default = "default_enable_push_updates")]
    pub enable_push_updates: bool,
}

impl RepoConfig {
    /// A git repository at `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            vcs: default_vcs(),
            reference: None,
            exclude: Vec::new(),
            enable_push_updates: default_enable_push_updates(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:6080".to_string()
}

fn default_health_check_uri() -> String {
    "/healthz".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_limit() -> i64 {
    5000
}

fn default_min_limit() -> i64 {
    1
}

fn default_max_limit() -> i64 {
    100_000
}

fn default_context() -> u32 {
    2
}

fn default_max_context() -> u32 {
    20
}

fn default_token_ttl_hours() -> u64 {
    24
}

fn default_min_password_len() -> usize {
    6
}

fn default_vcs() -> String {
    "git".to_string()
}

fn default_enable_push_updates() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            health_check_uri: default_health_check_uri(),
            data_dir: default_data_dir(),
            ui_dir: None,
        }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            min_limit: default_min_limit(),
            max_limit: default_max_limit(),
            default_context: default_context(),
            max_context: default_max_context(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            min_password_len: default_min_password_len(),
        }
    }
}

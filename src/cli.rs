//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, ConfigError};

/// searchgate - code search gateway over many repositories
#[derive(Debug, Parser)]
#[command(name = "searchgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML config file [default: ~/.config/searchgate/config.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, overriding server.bind_addr
    #[arg(long)]
    pub addr: Option<String>,

    /// Data directory for checkouts and users, overriding server.data_dir
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

/// The config as read from disk next to the copy the process runs with.
///
/// Only `file` may be written back; `runtime` carries the command-line
/// overrides, which must never reach the operator's config file.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub file: Config,
    pub runtime: Config,
    pub path: PathBuf,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::config_path)
    }

    /// Load the config and apply command-line overrides to a runtime copy.
    ///
    /// An explicit `--config` must exist; the default location may be absent.
    pub fn load_config(&self) -> Result<LoadedConfig, ConfigError> {
        let path = self.config_path();
        let file = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        let mut runtime = file.clone();
        self.apply_overrides(&mut runtime);
        runtime.validate()?;
        Ok(LoadedConfig {
            file,
            runtime,
            path,
        })
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(addr) = &self.addr {
            config.server.bind_addr = addr.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.server.data_dir = dir.clone();
        }
    }
}

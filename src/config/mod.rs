//! Configuration: TOML types, loading/validation and the shared store.

mod loader;
mod store;
mod types;

pub use loader::ConfigError;
pub use store::ConfigStore;
pub(crate) use store::write_locked;
pub use types::{AuthConfig, Config, RepoConfig, SearchLimits, ServerConfig};

//! Backend search units and the registry that serves them.
//!
//! Provides the [`Searcher`] capability contract, a thread-safe
//! [`BackendRegistry`] that can be extended or replaced at runtime without
//! interrupting in-flight searches, and a local filesystem implementation.

mod local;
mod registration;
mod registry;
mod searcher;
mod startup;

pub use local::{LocalSearcher, LocalSearcherFactory};
pub use registration::RegistryError;
pub use registry::{BackendRegistry, RegistrySnapshot};
pub use searcher::{
    FileMatch, Match, SearchError, SearchOptions, SearchResponse, Searcher, SearcherFactory,
};
pub use startup::build_searchers;

//! Fan-out query coordination and request parameter parsing.

mod fanout;
mod params;

pub use fanout::{dispatch, SearchOutcome};
pub use params::{clamp_param, parse_bool, parse_range, RepoSelector, SearchRequest};

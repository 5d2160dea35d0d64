//! searchgate: a code search gateway in front of per-repository search
//! backends, with runtime repository registration and token-based access
//! control.

pub mod auth;
pub mod backend;
pub mod cli;
pub mod config;
pub mod logging;
pub mod search;
pub mod server;
pub mod users;

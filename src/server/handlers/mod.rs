pub mod assets;
pub mod auth;
pub mod repo_config;
pub mod repos;
pub mod search;
pub mod users;

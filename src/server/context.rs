use std::sync::Arc;

use crate::auth::{AuthGate, TokenService};
use crate::backend::{BackendRegistry, SearcherFactory};
use crate::config::ConfigStore;
use crate::users::UserStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: ConfigStore,
    pub registry: BackendRegistry,
    pub users: Arc<dyn UserStore>,
    pub tokens: TokenService,
    pub factory: Arc<dyn SearcherFactory>,
}

impl AppContext {
    pub fn new(
        config: ConfigStore,
        registry: BackendRegistry,
        users: Arc<dyn UserStore>,
        tokens: TokenService,
        factory: Arc<dyn SearcherFactory>,
    ) -> Self {
        Self {
            config,
            registry,
            users,
            tokens,
            factory,
        }
    }

    pub fn gate(&self) -> AuthGate {
        AuthGate::new(self.tokens.clone(), Arc::clone(&self.users))
    }
}

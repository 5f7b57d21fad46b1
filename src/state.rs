use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenIssuer};
use crate::config::AppConfig;
use crate::database::Store;
use crate::services::auth_service::AuthService;
use crate::services::email::Mailer;

/// Shared, immutable collaborators handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let tokens = Arc::new(TokenIssuer::from_config(&config.security));
        Self { config: Arc::new(config), store, mailer, hasher, tokens }
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.store.clone(),
            self.hasher.clone(),
            self.tokens.clone(),
            self.mailer.clone(),
            self.config.security.clone(),
        )
    }
}

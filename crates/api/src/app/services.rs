//! Service wiring shared by every handler.

use std::sync::Arc;

use natours_auth::{Mailer, PasswordHasher, SessionManager, SessionTokens};
use natours_infra::{DocumentStore, DocumentUserRepository, InMemoryDocumentStore, ReviewRepository, TourRepository};

use crate::config::AppConfig;

/// Repositories, the session manager and the configuration they were built from.
pub struct AppServices {
    pub config: AppConfig,
    pub sessions: SessionManager,
    pub users: Arc<DocumentUserRepository>,
    pub tours: TourRepository,
    pub reviews: ReviewRepository,
}

impl AppServices {
    pub fn new(store: Arc<dyn DocumentStore>, mailer: Arc<dyn Mailer>, config: AppConfig) -> Self {
        let users = Arc::new(DocumentUserRepository::new(store.clone()));
        let sessions = SessionManager::new(
            users.clone(),
            mailer,
            SessionTokens::new(config.jwt_secret.as_bytes(), config.jwt_expires_in),
            PasswordHasher::new(config.bcrypt_cost),
        );

        Self {
            sessions,
            users,
            tours: TourRepository::new(store.clone()),
            reviews: ReviewRepository::new(store),
            config,
        }
    }

    /// Services over a fresh in-memory store.
    pub fn in_memory(config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self::new(Arc::new(InMemoryDocumentStore::new()), mailer, config)
    }
}

//! Infrastructure layer: document storage, repositories, mail delivery, seed data.

pub mod document_store;
pub mod mailer;
pub mod repositories;
pub mod seed;


pub use document_store::{Collection, DocumentStore, InMemoryDocumentStore};
#[cfg(feature = "postgres")]
pub use document_store::PostgresDocumentStore;
pub use mailer::{HttpMailer, HttpMailerConfig, LogMailer};
pub use repositories::{DocumentUserRepository, Documents, ReviewRepository, TourRepository};
pub use seed::{SeedError, load_tour_drafts, seed_tours};

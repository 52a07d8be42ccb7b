use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use natours_auth::{User, UserRepository, UserView};
use natours_core::{DocumentQuery, FieldFilter, StoreError, UserId};

use super::Documents;
use crate::document_store::{Collection, DocumentStore};

/// User accounts stored in the `users` collection.
#[derive(Clone)]
pub struct DocumentUserRepository {
    docs: Documents<User>,
}

impl DocumentUserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs: Documents::new(store, Collection::Users),
        }
    }

    /// Active accounts rendered as [`UserView`], shaped by the query's projection.
    pub async fn list_active(&self, query: DocumentQuery) -> Result<Vec<Value>, StoreError> {
        let (query, projection) = query.split_projection();
        let users = self
            .docs
            .find(query.find([FieldFilter::eq("active", true)]))
            .await?;

        users
            .iter()
            .map(|user| {
                serde_json::to_value(UserView::from(user))
                    .map(|doc| projection.apply(doc))
                    .map_err(|e| StoreError::corrupt(e.to_string()))
            })
            .collect()
    }

    pub async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        self.docs.delete(id).await
    }
}

#[async_trait]
impl UserRepository for DocumentUserRepository {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        self.docs.insert(user).await
    }

    async fn save(&self, user: User) -> Result<User, StoreError> {
        let id = user.id;
        self.docs
            .replace(user)
            .await?
            .ok_or_else(|| StoreError::backend(format!("user {id} was removed concurrently")))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.docs.get(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.docs.find_one(DocumentQuery::new().where_eq("email", email)).await
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        self.docs
            .find_one(DocumentQuery::new().where_eq("passwordResetToken", token_hash))
            .await
    }
}

use std::sync::Arc;

use serde_json::Value;

use natours_core::{DocumentQuery, StoreError, TourId};
use natours_tours::{HIDDEN_TOUR_FIELDS, Tour, with_virtuals};

use super::Documents;
use crate::document_store::{Collection, DocumentStore};

#[derive(Clone)]
pub struct TourRepository {
    docs: Documents<Tour>,
}

impl TourRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs: Documents::new(store, Collection::Tours),
        }
    }

    /// Starting handle for tour listings: hidden fields already applied.
    pub fn base_query() -> DocumentQuery {
        HIDDEN_TOUR_FIELDS
            .iter()
            .fold(DocumentQuery::new(), |query, field| query.hide(*field))
    }

    pub async fn insert(&self, tour: Tour) -> Result<Tour, StoreError> {
        self.docs.insert(tour).await
    }

    pub async fn get(&self, id: TourId) -> Result<Option<Tour>, StoreError> {
        self.docs.get(id).await
    }

    pub async fn replace(&self, tour: Tour) -> Result<Option<Tour>, StoreError> {
        self.docs.replace(tour).await
    }

    pub async fn delete(&self, id: TourId) -> Result<bool, StoreError> {
        self.docs.delete(id).await
    }

    /// Projected tour documents with virtual fields added.
    pub async fn list(&self, query: &DocumentQuery) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .docs
            .find_documents(query)
            .await?
            .into_iter()
            .map(with_virtuals)
            .collect())
    }

    pub async fn all(&self) -> Result<Vec<Tour>, StoreError> {
        self.docs.find(DocumentQuery::new()).await
    }
}

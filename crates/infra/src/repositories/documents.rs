use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use natours_core::{DocumentQuery, Entity, StoreError};

use crate::document_store::{Collection, DocumentStore};

/// Typed view of one collection: records go in and come out as `T`.
pub struct Documents<T> {
    store: Arc<dyn DocumentStore>,
    collection: Collection,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Documents<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection,
            _record: PhantomData,
        }
    }
}

impl<T: Entity> Documents<T> {
    pub fn new(store: Arc<dyn DocumentStore>, collection: Collection) -> Self {
        Self {
            store,
            collection,
            _record: PhantomData,
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub async fn insert(&self, record: T) -> Result<T, StoreError> {
        let id = record.id().into();
        let doc = self.store.insert(self.collection, id, encode(&record)?).await?;
        decode(doc)
    }

    pub async fn get(&self, id: T::Id) -> Result<Option<T>, StoreError> {
        self.store
            .get(self.collection, id.into())
            .await?
            .map(decode)
            .transpose()
    }

    /// `Ok(None)` when the record no longer exists.
    pub async fn replace(&self, record: T) -> Result<Option<T>, StoreError> {
        let id = record.id().into();
        self.store
            .replace(self.collection, id, encode(&record)?)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn delete(&self, id: T::Id) -> Result<bool, StoreError> {
        self.store.delete(self.collection, id.into()).await
    }

    /// Decoded records; the query's projection is not applied.
    pub async fn find(&self, query: DocumentQuery) -> Result<Vec<T>, StoreError> {
        let (query, _) = query.split_projection();
        self.store
            .find(self.collection, &query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn find_one(&self, query: DocumentQuery) -> Result<Option<T>, StoreError> {
        Ok(self.find(query.limit(1)).await?.into_iter().next())
    }

    /// Raw projected documents.
    pub async fn find_documents(&self, query: &DocumentQuery) -> Result<Vec<Value>, StoreError> {
        self.store.find(self.collection, query).await
    }
}

fn encode<T: Entity>(record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::corrupt(format!("failed to encode record: {e}")))
}

fn decode<T: Entity>(doc: Value) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|e| StoreError::corrupt(format!("failed to decode record: {e}")))
}

//! JSON document store boundary.
//!
//! Records are kept as JSON objects keyed by id, grouped into collections.
//! Every stored document carries `id` and the revision counter `__v`;
//! `__v` starts at 0 and is bumped by every replace.

pub mod in_memory;
pub mod matcher;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use natours_core::{DocumentQuery, StoreError};

pub use in_memory::InMemoryDocumentStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Tours,
    Users,
    Reviews,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Tours, Collection::Users, Collection::Reviews];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Tours => "tours",
            Collection::Users => "users",
            Collection::Reviews => "reviews",
        }
    }

    /// Top-level fields whose values must be unique across the collection.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Tours => &["name"],
            Collection::Users => &["email"],
            Collection::Reviews => &[],
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document under `id`. Returns it as stored.
    async fn insert(&self, collection: Collection, id: Uuid, doc: Value) -> Result<Value, StoreError>;

    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError>;

    /// Overwrite an existing document. `Ok(None)` when `id` is unknown.
    async fn replace(&self, collection: Collection, id: Uuid, doc: Value) -> Result<Option<Value>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError>;

    /// Execute a query handle: filter, sort, skip/limit, then project.
    async fn find(&self, collection: Collection, query: &DocumentQuery) -> Result<Vec<Value>, StoreError>;
}

/// Render a unique-field value the way conflict messages quote it.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Stamp `id` and `__v` onto a document body.
pub(crate) fn stamp(doc: Value, id: Uuid, revision: u64) -> Result<Value, StoreError> {
    let Value::Object(mut map) = doc else {
        return Err(StoreError::corrupt("document body must be a JSON object"));
    };
    map.insert("id".to_string(), Value::String(id.to_string()));
    map.insert(natours_core::REVISION_FIELD.to_string(), Value::from(revision));
    Ok(Value::Object(map))
}

pub(crate) fn revision_of(doc: &Value) -> u64 {
    doc.get(natours_core::REVISION_FIELD)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

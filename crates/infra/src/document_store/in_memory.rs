use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use natours_core::{DocumentQuery, StoreError};

use super::matcher::{Matcher, compare_documents};
use super::{Collection, DocumentStore, display_value, revision_of, stamp};

/// In-memory document store.
///
/// Intended for tests/dev and for running without a database. Documents are
/// kept in id order, which for UUIDv7 keys is insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<Collection, BTreeMap<Uuid, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(
        collection: Collection,
        docs: &BTreeMap<Uuid, Value>,
        id: Uuid,
        doc: &Value,
    ) -> Result<(), StoreError> {
        for field in collection.unique_fields() {
            let Some(value) = doc.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = docs
                .iter()
                .any(|(other_id, other)| *other_id != id && other.get(*field) == Some(value));
            if taken {
                return Err(StoreError::Duplicate {
                    field: field.to_string(),
                    value: display_value(value),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: Collection, id: Uuid, doc: Value) -> Result<Value, StoreError> {
        let doc = stamp(doc, id, 0)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        if docs.contains_key(&id) {
            return Err(StoreError::Duplicate {
                field: "id".to_string(),
                value: id.to_string(),
            });
        }
        Self::check_unique(collection, docs, id, &doc)?;

        docs.insert(id, doc.clone());
        Ok(doc)
    }

    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).and_then(|docs| docs.get(&id)).cloned())
    }

    async fn replace(&self, collection: Collection, id: Uuid, doc: Value) -> Result<Option<Value>, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();

        let Some(current) = docs.get(&id) else {
            return Ok(None);
        };
        let doc = stamp(doc, id, revision_of(current) + 1)?;
        Self::check_unique(collection, docs, id, &doc)?;

        docs.insert(id, doc.clone());
        Ok(Some(doc))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(&collection)
            .map(|docs| docs.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn find(&self, collection: Collection, query: &DocumentQuery) -> Result<Vec<Value>, StoreError> {
        let matcher = Matcher::compile(query.filters())?;

        let mut hits = Vec::new();
        {
            let collections = self.collections.read().await;
            if let Some(docs) = collections.get(&collection) {
                for doc in docs.values() {
                    if matcher.matches(doc)? {
                        hits.push(doc.clone());
                    }
                }
            }
        }

        if !query.sort_keys().is_empty() {
            hits.sort_by(|a, b| compare_documents(a, b, query.sort_keys()));
        }

        let skip = usize::try_from(query.skip_count()).unwrap_or(usize::MAX);
        let limit = query
            .limit_count()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);

        let projection = query.projection();
        Ok(hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| projection.apply(doc))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natours_core::{ApiFeatures, QueryParams, REVISION_FIELD};
    use serde_json::json;

    async fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        for (name, price, created) in [
            ("The Forest Hiker", 397, "2021-01-01T00:00:00Z"),
            ("The Sea Explorer", 497, "2021-01-02T00:00:00Z"),
            ("The Snow Adventurer", 997, "2021-01-03T00:00:00Z"),
        ] {
            store
                .insert(
                    Collection::Tours,
                    Uuid::now_v7(),
                    json!({"name": name, "price": price, "createdAt": created}),
                )
                .await
                .unwrap();
        }
        store
    }

    fn query(pairs: &[(&str, &str)]) -> DocumentQuery {
        let params = QueryParams::from_pairs(pairs.iter().copied());
        ApiFeatures::new(DocumentQuery::new().hide("createdAt"), &params)
            .filter()
            .sort()
            .select()
            .paginate()
            .into_query()
    }

    #[tokio::test]
    async fn insert_stamps_id_and_revision() {
        let store = InMemoryDocumentStore::new();
        let id = Uuid::now_v7();
        let doc = store.insert(Collection::Reviews, id, json!({"review": "ok"})).await.unwrap();

        assert_eq!(doc["id"], json!(id.to_string()));
        assert_eq!(doc[REVISION_FIELD], json!(0));
    }

    #[tokio::test]
    async fn replace_bumps_revision() {
        let store = InMemoryDocumentStore::new();
        let id = Uuid::now_v7();
        store.insert(Collection::Reviews, id, json!({"review": "ok"})).await.unwrap();

        let doc = store
            .replace(Collection::Reviews, id, json!({"review": "better"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc[REVISION_FIELD], json!(1));

        let missing = store
            .replace(Collection::Reviews, Uuid::now_v7(), json!({"review": "x"}))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn unique_fields_are_enforced() {
        let store = seeded().await;
        let err = store
            .insert(Collection::Tours, Uuid::now_v7(), json!({"name": "The Forest Hiker"}))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::Duplicate {
                field: "name".into(),
                value: "The Forest Hiker".into()
            }
        );
    }

    #[tokio::test]
    async fn replace_may_keep_its_own_unique_value() {
        let store = InMemoryDocumentStore::new();
        let id = Uuid::now_v7();
        store.insert(Collection::Users, id, json!({"email": "a@b.io"})).await.unwrap();
        assert!(store
            .replace(Collection::Users, id, json!({"email": "a@b.io", "name": "A"}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn find_filters_sorts_and_paginates() {
        let store = seeded().await;

        let docs = store
            .find(Collection::Tours, &query(&[("price[gte]", "400"), ("sort", "price")]))
            .await
            .unwrap();
        let names: Vec<_> = docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["The Sea Explorer", "The Snow Adventurer"]);

        let page = store
            .find(Collection::Tours, &query(&[("page", "2"), ("limit", "2")]))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        // Default order is newest first.
        assert_eq!(page[0]["name"], "The Forest Hiker");
    }

    #[tokio::test]
    async fn projection_hides_revision_and_hidden_fields() {
        let store = seeded().await;

        let docs = store.find(Collection::Tours, &query(&[])).await.unwrap();
        assert!(docs.iter().all(|d| d.get(REVISION_FIELD).is_none()));
        assert!(docs.iter().all(|d| d.get("createdAt").is_none()));

        let selected = store
            .find(Collection::Tours, &query(&[("fields", "name,__v")]))
            .await
            .unwrap();
        for doc in selected {
            let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
            assert_eq!(keys, vec!["id".to_string(), "name".to_string()]);
        }
    }

    #[tokio::test]
    async fn unsupported_operator_is_a_query_error() {
        let store = seeded().await;
        let err = store
            .find(Collection::Tours, &query(&[("price[regex]", "4")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = InMemoryDocumentStore::new();
        let id = Uuid::now_v7();
        store.insert(Collection::Reviews, id, json!({"review": "ok"})).await.unwrap();

        assert!(store.delete(Collection::Reviews, id).await.unwrap());
        assert!(!store.delete(Collection::Reviews, id).await.unwrap());
        assert!(store.get(Collection::Reviews, id).await.unwrap().is_none());
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::Result;
use crate::read_model::{FieldFilter, ReadModelStore, with_id};

type Collection = HashMap<String, Value>;

/// In-memory read model store.
///
/// Documents are replaced whole under the write lock, so a reader never sees
/// a half-written document.
#[derive(Clone, Default)]
pub struct InMemoryReadModelStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryReadModelStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadModelStore for InMemoryReadModelStore {
    async fn save(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let document = Value::Object(with_id(collection, id, data)?);
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn find(&self, collection: &str, filter: &FieldFilter) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len))
    }
}

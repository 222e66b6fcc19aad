use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use vela_core::record::SearchRecord;
use vela_core::store::{SearchPatch, SearchStore};

/// Reference implementation of the persistence collaborator. Production
/// wiring swaps in a database-backed store behind the same trait.
pub struct InMemorySearchStore {
    records: RwLock<HashMap<Uuid, SearchRecord>>,
}

impl InMemorySearchStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySearchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchStore for InMemorySearchStore {
    async fn create_search(
        &self,
        record: SearchRecord,
    ) -> Result<SearchRecord, Box<dyn std::error::Error + Send + Sync>> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_search(
        &self,
        id: Uuid,
    ) -> Result<Option<SearchRecord>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update_search(
        &self,
        id: Uuid,
        patch: SearchPatch,
    ) -> Result<SearchRecord, Box<dyn std::error::Error + Send + Sync>> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| format!("search {} does not exist", id))?;
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(results) = patch.results {
            record.results = results;
        }
        if let Some(errors) = patch.errors {
            record.errors = errors;
        }
        if let Some(completed_at) = patch.completed_at {
            record.completed_at = Some(completed_at);
        }
        Ok(record.clone())
    }
}

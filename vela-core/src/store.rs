use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::flight::FlightResult;
use crate::record::{SearchRecord, SearchStatus};

/// Fields the orchestrator writes back when a search finishes
#[derive(Debug, Clone, Default)]
pub struct SearchPatch {
    pub status: Option<SearchStatus>,
    pub results: Option<Vec<FlightResult>>,
    pub errors: Option<Vec<String>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Persistence collaborator for search records. The orchestrator treats this
/// as a black box; schema and storage engine live elsewhere.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn create_search(
        &self,
        record: SearchRecord,
    ) -> Result<SearchRecord, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_search(
        &self,
        id: Uuid,
    ) -> Result<Option<SearchRecord>, Box<dyn std::error::Error + Send + Sync>>;

    async fn update_search(
        &self,
        id: Uuid,
        patch: SearchPatch,
    ) -> Result<SearchRecord, Box<dyn std::error::Error + Send + Sync>>;
}

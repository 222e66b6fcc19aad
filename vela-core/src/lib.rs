pub mod criteria;
pub mod flight;
pub mod provider;
pub mod record;
pub mod retry;
pub mod store;

use uuid::Uuid;

/// Errors surfaced synchronously to the caller of the orchestration layer.
/// Provider-scoped failures live in [`provider::ProviderError`] and never
/// fail a search on their own.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search capacity exceeded: {active} active searches (limit {limit})")]
    CapacityExceeded { active: usize, limit: usize },
    #[error("Search not found: {0}")]
    NotFound(Uuid),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Orchestration failed: {0}")]
    Orchestration(String),
}

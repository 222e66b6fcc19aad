use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use vela_core::provider::{ProviderAdapter, ProviderError, ProviderStatus};

/// Resolves a provider name to a live adapter instance and owns adapter
/// lifecycle. One registry per orchestrator.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Register an adapter under its own name; replaces any previous instance
    pub async fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        let name = adapter.name().to_string();
        info!("Registering provider adapter [{}]", name);
        self.adapters.write().await.insert(name, adapter);
    }

    pub async fn deregister(&self, name: &str) -> bool {
        self.adapters.write().await.remove(name).is_some()
    }

    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.adapters
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    pub async fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Health snapshot across every registered adapter
    pub async fn aggregate_health(&self) -> Vec<ProviderStatus> {
        let adapters: Vec<Arc<dyn ProviderAdapter>> =
            self.adapters.read().await.values().cloned().collect();
        let mut statuses =
            futures_util::future::join_all(adapters.iter().map(|adapter| adapter.status())).await;
        statuses.sort_by(|a, b| a.provider.cmp(&b.provider));
        statuses
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAdapter, MockOutcome};
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolve_registered_adapter() {
        let registry = AdapterRegistry::new();
        registry
            .register(Arc::new(MockAdapter::new(
                "amadeus",
                Duration::ZERO,
                MockOutcome::Results(Vec::new()),
            )))
            .await;

        assert!(registry.resolve("amadeus").await.is_ok());
        assert_eq!(registry.provider_names().await, vec!["amadeus"]);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_error() {
        let registry = AdapterRegistry::new();
        let err = match registry.resolve("galileo").await {
            Ok(_) => panic!("expected UnknownProvider error"),
            Err(e) => e,
        };
        assert!(matches!(err, ProviderError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn test_deregister_removes_adapter() {
        let registry = AdapterRegistry::new();
        registry
            .register(Arc::new(MockAdapter::new(
                "sabre",
                Duration::ZERO,
                MockOutcome::Results(Vec::new()),
            )))
            .await;

        assert!(registry.deregister("sabre").await);
        assert!(!registry.deregister("sabre").await);
        assert!(registry.resolve("sabre").await.is_err());
    }

    #[tokio::test]
    async fn test_aggregate_health_covers_all_adapters() {
        let registry = AdapterRegistry::new();
        for name in ["amadeus", "sabre"] {
            registry
                .register(Arc::new(MockAdapter::new(
                    name,
                    Duration::ZERO,
                    MockOutcome::Results(Vec::new()),
                )))
                .await;
        }

        let statuses = registry.aggregate_health().await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].provider, "amadeus");
        assert_eq!(statuses[1].provider, "sabre");
    }
}

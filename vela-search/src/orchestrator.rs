use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vela_core::criteria::SearchCriteria;
use vela_core::flight::FlightResult;
use vela_core::provider::{ProviderError, ProviderStatus};
use vela_core::record::{SearchPhase, SearchProgress, SearchRecord, SearchStatus};
use vela_core::store::{SearchPatch, SearchStore};
use vela_core::SearchError;
use vela_providers::AdapterRegistry;

use crate::cache::ResultCache;
use crate::config::VelaConfig;
use crate::pipeline::{self, FilterSpec, SortKey, SortOrder};
use crate::progress::{ProgressEvent, ProgressPublisher};

/// Per-submission knobs; everything else comes from [`VelaConfig`]
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Providers to fan out to; empty means every registered adapter
    pub providers: Vec<String>,
    /// Global deadline across the whole fan-out
    pub timeout: Duration,
    /// Sort applied during aggregation; price ascending when unset
    pub sort: Option<SortKey>,
    pub use_cache: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            timeout: Duration::from_secs(30),
            sort: None,
            use_cache: true,
        }
    }
}

impl SearchOptions {
    /// Options seeded from loaded configuration
    pub fn from_config(config: &VelaConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.orchestrator.default_timeout_secs),
            use_cache: config.cache.enabled,
            ..Default::default()
        }
    }
}

/// Aggregate status across the registry, cache and active-search table
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub healthy: bool,
    pub providers: Vec<ProviderStatus>,
    pub cache_entries: usize,
    pub active_searches: usize,
}

struct ActiveSearch {
    progress: SearchProgress,
    cancel_tx: watch::Sender<bool>,
}

type ProviderOutcome = (String, Result<Vec<FlightResult>, ProviderError>);

/// Fans one search out to every requested provider, aggregates whatever
/// settles before the deadline, keeps observers posted through the room
/// publisher, and persists the terminal record. The active-search table is
/// owned here; nothing else mutates it.
pub struct SearchOrchestrator {
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn SearchStore>,
    cache: Arc<ResultCache>,
    publisher: Arc<ProgressPublisher>,
    active: RwLock<HashMap<Uuid, ActiveSearch>>,
    config: VelaConfig,
}

impl SearchOrchestrator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn SearchStore>,
        cache: Arc<ResultCache>,
        publisher: Arc<ProgressPublisher>,
        config: VelaConfig,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            publisher,
            active: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Run one search end to end. Individual provider failures are recorded
    /// and tolerated; only internal orchestration errors surface here.
    pub async fn submit(
        &self,
        criteria: SearchCriteria,
        options: SearchOptions,
    ) -> Result<SearchRecord, SearchError> {
        criteria.validate().map_err(SearchError::Validation)?;

        let providers = self.requested_providers(&options).await;
        if providers.is_empty() {
            return Err(SearchError::Validation(
                "No providers requested or registered".to_string(),
            ));
        }

        let record = SearchRecord::new(criteria.clone());
        let search_id = record.id;
        let (cancel_tx, cancel_rx) = watch::channel(false);

        // Admission control: the only backpressure valve in the system.
        // Check and insert under one write lock so two racing submissions
        // cannot both squeeze under the ceiling.
        {
            let mut active = self.active.write().await;
            let limit = self.config.orchestrator.max_concurrent_searches;
            if active.len() >= limit {
                return Err(SearchError::CapacityExceeded {
                    active: active.len(),
                    limit,
                });
            }
            active.insert(
                search_id,
                ActiveSearch {
                    progress: SearchProgress::new(search_id, providers.len()),
                    cancel_tx,
                },
            );
        }

        if let Err(err) = self.store.create_search(record).await {
            self.active.write().await.remove(&search_id);
            return Err(SearchError::Orchestration(err.to_string()));
        }
        info!(
            "Search [{}] submitted: {} -> {} across {} providers",
            search_id,
            criteria.origin.trim().to_uppercase(),
            criteria.destination.trim().to_uppercase(),
            providers.len()
        );
        let snapshot = self.snapshot(search_id).await;
        self.publish_snapshot(snapshot).await;

        match self
            .run_search(search_id, &criteria, &providers, &options, cancel_rx)
            .await
        {
            Ok(record) => Ok(record),
            Err(err) => {
                error!("Search [{}] orchestration failed: {}", search_id, err);
                let _ = self
                    .store
                    .update_search(
                        search_id,
                        SearchPatch {
                            status: Some(SearchStatus::Error),
                            errors: Some(vec![err.to_string()]),
                            completed_at: Some(Utc::now()),
                            results: None,
                        },
                    )
                    .await;
                self.active.write().await.remove(&search_id);
                self.publisher
                    .publish(
                        search_id,
                        ProgressEvent::Failed {
                            search_id,
                            error: err.to_string(),
                        },
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn run_search(
        &self,
        search_id: Uuid,
        criteria: &SearchCriteria,
        providers: &[String],
        options: &SearchOptions,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> Result<SearchRecord, SearchError> {
        let total = providers.len();
        let use_cache = options.use_cache && self.config.cache.enabled;
        let ttl = Duration::from_secs(self.config.cache.ttl_secs);

        let snapshot = self.with_progress(search_id, |p| p.begin_search()).await;
        self.publish_snapshot(snapshot).await;

        // One message per provider; capacity covers the inline sends below
        // so nothing blocks before the drain loop starts.
        let (tx, mut rx) = mpsc::channel::<ProviderOutcome>(total);
        let mut pending: HashSet<String> = providers.iter().cloned().collect();
        let mut cached: HashSet<String> = HashSet::new();

        for name in providers {
            if use_cache {
                let key = ResultCache::fingerprint(criteria, name);
                if let Some(hit) = self.cache.get(&key).await {
                    debug!("Search [{}] cache hit for provider [{}]", search_id, name);
                    cached.insert(name.clone());
                    let _ = tx.send((name.clone(), Ok(hit))).await;
                    continue;
                }
            }
            match self.registry.resolve(name).await {
                Ok(adapter) => {
                    let tx = tx.clone();
                    let criteria = criteria.clone();
                    let name = name.clone();
                    tokio::spawn(async move {
                        let outcome = adapter.search(&criteria).await;
                        // The drain loop may be gone after the deadline;
                        // whatever settles late is dropped right here
                        let _ = tx.send((name, outcome)).await;
                    });
                }
                Err(err) => {
                    let _ = tx.send((name.clone(), Err(err))).await;
                }
            }
        }
        drop(tx);

        let deadline = tokio::time::sleep(options.timeout);
        tokio::pin!(deadline);

        let mut collected: Vec<FlightResult> = Vec::new();
        let mut fresh: Vec<(String, Vec<FlightResult>)> = Vec::new();
        let mut settled = 0usize;
        let mut watch_cancel = true;

        while settled < total {
            tokio::select! {
                changed = cancel_rx.changed(), if watch_cancel => {
                    if *cancel_rx.borrow_and_update() {
                        info!("Search [{}] cancelled; abandoning fan-out", search_id);
                        return self.load_record(search_id).await;
                    }
                    if changed.is_err() {
                        // Signal source is gone; nothing left to watch
                        watch_cancel = false;
                    }
                }
                _ = &mut deadline => {
                    warn!(
                        "Search [{}] hit its {}ms deadline with {} providers outstanding",
                        search_id,
                        options.timeout.as_millis(),
                        pending.len()
                    );
                    for name in pending.drain() {
                        let snapshot = self
                            .with_progress(search_id, |p| {
                                p.record_error(format!("{}: Search timeout", name))
                            })
                            .await;
                        self.publish_snapshot(snapshot).await;
                    }
                    break;
                }
                maybe = rx.recv() => {
                    let Some((name, outcome)) = maybe else { break };
                    if !pending.remove(&name) {
                        continue;
                    }
                    settled += 1;
                    match outcome {
                        Ok(results) => {
                            debug!(
                                "Search [{}] provider [{}] settled with {} results",
                                search_id,
                                name,
                                results.len()
                            );
                            if use_cache && !cached.contains(&name) {
                                fresh.push((name.clone(), results.clone()));
                            }
                            let count = results.len();
                            collected.extend(results);
                            let snapshot = self
                                .with_progress(search_id, |p| p.record_source(&name, count))
                                .await;
                            self.publish_snapshot(snapshot).await;
                        }
                        Err(err) => {
                            warn!(
                                "Search [{}] provider [{}] failed: {}",
                                search_id, name, err
                            );
                            let snapshot = self
                                .with_progress(search_id, |p| {
                                    p.record_error(format!("{}: {}", name, err))
                                })
                                .await;
                            self.publish_snapshot(snapshot).await;
                        }
                    }
                }
            }
        }

        // Aggregation. If the entry is gone the search was cancelled while
        // the last providers were settling; the record already says so.
        let Some(snapshot) = self
            .with_progress(search_id, |p| p.begin_aggregation())
            .await
        else {
            return self.load_record(search_id).await;
        };
        let errors = snapshot.errors.clone();
        self.publish_snapshot(Some(snapshot)).await;

        let sort_key = options.sort.unwrap_or(SortKey::Price);
        pipeline::sort_flights(&mut collected, sort_key, sort_key.default_order());
        let result_count = collected.len();

        let record = self
            .store
            .update_search(
                search_id,
                SearchPatch {
                    status: Some(SearchStatus::Completed),
                    results: Some(collected),
                    errors: Some(errors),
                    completed_at: Some(Utc::now()),
                },
            )
            .await
            .map_err(|e| SearchError::Orchestration(e.to_string()))?;

        if use_cache {
            for (name, results) in fresh {
                let key = ResultCache::fingerprint(criteria, &name);
                self.cache.set(&key, results, ttl).await;
            }
        }

        {
            let mut active = self.active.write().await;
            if let Some(mut entry) = active.remove(&search_id) {
                entry.progress.finish(SearchPhase::Completed);
            }
        }
        self.publisher
            .publish(
                search_id,
                ProgressEvent::Completed {
                    search_id,
                    result_count,
                },
            )
            .await;
        info!(
            "Search [{}] completed with {} results from {} providers",
            search_id,
            result_count,
            total
        );
        Ok(record)
    }

    /// Snapshot of one in-flight search
    pub async fn progress(&self, search_id: Uuid) -> Result<SearchProgress, SearchError> {
        self.snapshot(search_id)
            .await
            .ok_or(SearchError::NotFound(search_id))
    }

    /// Snapshots of every in-flight search
    pub async fn list_active(&self) -> Vec<SearchProgress> {
        let active = self.active.read().await;
        let mut snapshots: Vec<SearchProgress> =
            active.values().map(|entry| entry.progress.clone()).collect();
        snapshots.sort_by_key(|p| p.started_at);
        snapshots
    }

    /// Cooperative cancellation: stops progress, marks the record, and
    /// leaves in-flight provider calls to finish into the void. Returns
    /// false when the search is unknown or already terminal.
    pub async fn cancel(&self, search_id: Uuid) -> bool {
        let entry = {
            let mut active = self.active.write().await;
            match active.get(&search_id) {
                Some(entry) if entry.progress.phase.can_cancel() => {
                    active.remove(&search_id)
                }
                _ => None,
            }
        };
        let Some(mut entry) = entry else {
            return false;
        };
        entry.progress.finish(SearchPhase::Cancelled);

        // Persist before signalling so the fan-out loop always reloads a
        // record that already says cancelled
        let mut errors = entry.progress.errors.clone();
        errors.push("Search cancelled by user".to_string());
        if let Err(err) = self
            .store
            .update_search(
                search_id,
                SearchPatch {
                    status: Some(SearchStatus::Error),
                    errors: Some(errors),
                    completed_at: Some(Utc::now()),
                    results: None,
                },
            )
            .await
        {
            error!("Search [{}] cancel failed to persist: {}", search_id, err);
        }
        let _ = entry.cancel_tx.send(true);
        self.publisher
            .publish(search_id, ProgressEvent::Cancelled { search_id })
            .await;
        info!("Search [{}] cancelled", search_id);
        true
    }

    /// Filter a completed search's stored results; does not mutate them
    pub async fn filter_results(
        &self,
        search_id: Uuid,
        spec: &FilterSpec,
    ) -> Result<Vec<FlightResult>, SearchError> {
        let record = self.completed_record(search_id).await?;
        let filtered = pipeline::apply_filters(&record.results, spec);
        self.publisher
            .publish(
                search_id,
                ProgressEvent::Filtered {
                    search_id,
                    result_count: filtered.len(),
                },
            )
            .await;
        Ok(filtered)
    }

    /// Re-sort a completed search's stored results and persist the order
    pub async fn sort_results(
        &self,
        search_id: Uuid,
        key: SortKey,
        order: SortOrder,
    ) -> Result<Vec<FlightResult>, SearchError> {
        let record = self.completed_record(search_id).await?;
        let mut results = record.results;
        pipeline::sort_flights(&mut results, key, order);

        let record = self
            .store
            .update_search(
                search_id,
                SearchPatch {
                    results: Some(results),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| SearchError::Orchestration(e.to_string()))?;
        self.publisher
            .publish(
                search_id,
                ProgressEvent::Sorted {
                    search_id,
                    sort_key: key.as_str().to_string(),
                },
            )
            .await;
        Ok(record.results)
    }

    pub async fn health_check(&self) -> SystemHealth {
        let providers = self.registry.aggregate_health().await;
        let healthy = providers.iter().all(|p| p.is_healthy);
        SystemHealth {
            healthy,
            providers,
            cache_entries: self.cache.len().await,
            active_searches: self.active.read().await.len(),
        }
    }

    async fn requested_providers(&self, options: &SearchOptions) -> Vec<String> {
        let requested = if options.providers.is_empty() {
            self.registry.provider_names().await
        } else {
            options.providers.clone()
        };
        // Duplicates would double-count progress
        let mut seen = HashSet::new();
        requested
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    async fn snapshot(&self, search_id: Uuid) -> Option<SearchProgress> {
        self.active
            .read()
            .await
            .get(&search_id)
            .map(|entry| entry.progress.clone())
    }

    async fn with_progress<F>(&self, search_id: Uuid, mutate: F) -> Option<SearchProgress>
    where
        F: FnOnce(&mut SearchProgress),
    {
        let mut active = self.active.write().await;
        let entry = active.get_mut(&search_id)?;
        mutate(&mut entry.progress);
        Some(entry.progress.clone())
    }

    async fn publish_snapshot(&self, snapshot: Option<SearchProgress>) {
        if let Some(progress) = snapshot {
            let search_id = progress.search_id;
            self.publisher
                .publish(search_id, ProgressEvent::Progress { progress })
                .await;
        }
    }

    async fn load_record(&self, search_id: Uuid) -> Result<SearchRecord, SearchError> {
        self.store
            .get_search(search_id)
            .await
            .map_err(|e| SearchError::Orchestration(e.to_string()))?
            .ok_or(SearchError::NotFound(search_id))
    }

    async fn completed_record(&self, search_id: Uuid) -> Result<SearchRecord, SearchError> {
        let record = self.load_record(search_id).await?;
        if record.status != SearchStatus::Completed {
            return Err(SearchError::Validation(format!(
                "Search {} has not completed",
                search_id
            )));
        }
        Ok(record)
    }
}

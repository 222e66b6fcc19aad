use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::criteria::SearchCriteria;
use crate::flight::FlightResult;

/// Persisted lifecycle of a search record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    Pending,
    Completed,
    Error,
}

/// The durable unit handed to the persistence collaborator. Mutated exactly
/// once, to a terminal status, when orchestration finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: Uuid,
    pub criteria: SearchCriteria,
    pub status: SearchStatus,
    pub results: Vec<FlightResult>,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SearchRecord {
    pub fn new(criteria: SearchCriteria) -> Self {
        Self {
            id: Uuid::new_v4(),
            criteria,
            status: SearchStatus::Pending,
            results: Vec::new(),
            errors: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// In-flight state machine of a single search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchPhase {
    Initializing,
    Searching,
    Aggregating,
    Completed,
    Failed,
    Cancelled,
}

impl SearchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchPhase::Completed | SearchPhase::Failed | SearchPhase::Cancelled
        )
    }

    /// Caller-triggered cancellation is only reachable mid-flight
    pub fn can_cancel(&self) -> bool {
        matches!(self, SearchPhase::Searching | SearchPhase::Aggregating)
    }
}

/// Ephemeral, orchestrator-owned progress for one in-flight search.
/// Observers only ever see clones of this.
#[derive(Debug, Clone, Serialize)]
pub struct SearchProgress {
    pub search_id: Uuid,
    pub phase: SearchPhase,
    pub percent: u8,
    pub completed_sources: Vec<String>,
    pub total_sources: usize,
    pub results_so_far: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl SearchProgress {
    pub fn new(search_id: Uuid, total_sources: usize) -> Self {
        Self {
            search_id,
            phase: SearchPhase::Initializing,
            percent: 0,
            completed_sources: Vec::new(),
            total_sources,
            results_so_far: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            estimated_completion: None,
        }
    }

    /// Providers that have settled, successfully or not
    pub fn settled_sources(&self) -> usize {
        self.completed_sources.len() + self.errors.len()
    }

    /// Fan-out has started; providers are being queried
    pub fn begin_search(&mut self) {
        self.phase = SearchPhase::Searching;
        self.percent = 10;
    }

    /// A provider returned results
    pub fn record_source(&mut self, source: &str, result_count: usize) {
        self.completed_sources.push(source.to_string());
        self.results_so_far += result_count;
        self.advance();
    }

    /// A provider settled with a failure
    pub fn record_error(&mut self, message: String) {
        self.errors.push(message);
        self.advance();
    }

    fn advance(&mut self) {
        self.phase = SearchPhase::Searching;
        self.percent = searching_percent(self.settled_sources(), self.total_sources);
        self.estimated_completion = self.estimate_completion();
    }

    pub fn begin_aggregation(&mut self) {
        self.phase = SearchPhase::Aggregating;
        self.percent = 80;
    }

    pub fn finish(&mut self, phase: SearchPhase) {
        self.phase = phase;
        if phase == SearchPhase::Completed {
            self.percent = 100;
        }
        self.estimated_completion = None;
    }

    // Linear projection from the pace of providers settled so far
    fn estimate_completion(&self) -> Option<DateTime<Utc>> {
        let settled = self.settled_sources() as i64;
        let remaining = self.total_sources.saturating_sub(self.settled_sources()) as i32;
        if settled == 0 || remaining == 0 {
            return None;
        }
        let elapsed = Utc::now() - self.started_at;
        let per_source = elapsed / settled as i32;
        Some(Utc::now() + per_source * remaining)
    }
}

/// Progress while providers are settling: 10 + 70 * completed/total, clamped
fn searching_percent(settled: usize, total: usize) -> u8 {
    if total == 0 {
        return 80;
    }
    let pct = 10.0 + 70.0 * settled as f64 / total as f64;
    pct.clamp(10.0, 80.0) as u8
}

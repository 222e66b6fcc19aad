use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

use vela_core::record::SearchProgress;

// Events a slow observer can buffer before it starts losing them
const ROOM_CAPACITY: usize = 64;

/// One event per orchestrator state transition, plus the result-mutation
/// events emitted by post-completion filter/sort calls.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { progress: SearchProgress },
    Completed { search_id: Uuid, result_count: usize },
    Failed { search_id: Uuid, error: String },
    Cancelled { search_id: Uuid },
    Filtered { search_id: Uuid, result_count: usize },
    Sorted { search_id: Uuid, sort_key: String },
}

/// Room-scoped broadcast plane. Observers subscribe to one search id and
/// receive only that search's events; delivery is best-effort at-most-once
/// and there is no replay. Queries about current state go to the
/// orchestrator directly, not through the rooms.
pub struct ProgressPublisher {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<ProgressEvent>>>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Join the room for one search, creating it if needed
    pub async fn subscribe(&self, search_id: Uuid) -> ProgressSubscription {
        let mut rooms = self.rooms.write().await;
        let sender = rooms
            .entry(search_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0);
        ProgressSubscription {
            search_id,
            receiver: sender.subscribe(),
        }
    }

    /// Broadcast to one room only. Returns how many observers received the
    /// event; rooms nobody listens to anymore are reaped here.
    pub async fn publish(&self, search_id: Uuid, event: ProgressEvent) -> usize {
        let mut rooms = self.rooms.write().await;
        match rooms.get(&search_id) {
            Some(sender) => match sender.send(event) {
                Ok(delivered) => delivered,
                Err(_) => {
                    // Every receiver is gone
                    rooms.remove(&search_id);
                    debug!("Reaped empty progress room [{}]", search_id);
                    0
                }
            },
            None => 0,
        }
    }

    /// Drop the room outright; subscribers see their stream end
    pub async fn close_room(&self, search_id: Uuid) {
        self.rooms.write().await.remove(&search_id);
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// An observer's membership in one search's room. Dropping it leaves the
/// room; a lagged observer silently misses events and should re-query the
/// orchestrator for current progress.
pub struct ProgressSubscription {
    search_id: Uuid,
    receiver: broadcast::Receiver<ProgressEvent>,
}

impl ProgressSubscription {
    pub fn search_id(&self) -> Uuid {
        self.search_id
    }

    /// Next event, skipping over any gap caused by lag. None once the room
    /// is closed.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(
                        "Observer on [{}] lagged, missed {} events",
                        self.search_id, missed
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stream view for callers that prefer combinators
    pub fn into_stream(
        self,
    ) -> impl tokio_stream::Stream<Item = Result<ProgressEvent, BroadcastStreamRecvError>> {
        BroadcastStream::new(self.receiver)
    }
}

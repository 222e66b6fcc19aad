pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod store;

pub use cache::ResultCache;
pub use config::VelaConfig;
pub use orchestrator::{SearchOptions, SearchOrchestrator, SystemHealth};
pub use progress::{ProgressEvent, ProgressPublisher, ProgressSubscription};
pub use store::InMemorySearchStore;

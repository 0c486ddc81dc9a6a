//! Indexing pipeline: write coordination, retries, and the run orchestrator.

pub mod coordinator;
pub mod orchestrator;
pub mod retry;

pub use coordinator::WriteCoordinator;
pub use orchestrator::{CancelHandle, IndexingOrchestrator};
pub use retry::retry_with_backoff;

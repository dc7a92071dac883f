use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StoreResult;
use crate::types::{LinkState, LinkStatus, Patent, RawRecord, StorageId, Task};

/// Persistence for link statuses, raw records and normalized patents.
///
/// Implementations bound every call by their own timeout and report it as
/// `StoreError::Timeout`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Newest record for `link_hash` whose state blocks a new claim.
    async fn find_active_link(&self, link_hash: &str) -> StoreResult<Option<LinkStatus>>;
    async fn insert_link(&self, status: &LinkStatus) -> StoreResult<()>;
    async fn set_link_state(&self, id: &str, state: LinkState) -> StoreResult<()>;

    /// Persist a raw record and return the id assigned to it.
    async fn insert_raw_record(&self, record: &RawRecord) -> StoreResult<StorageId>;
    async fn raw_record(&self, id: &str) -> StoreResult<RawRecord>;

    async fn insert_patent(&self, patent: &Patent) -> StoreResult<()>;
    async fn patent(&self, storage_id: &str) -> StoreResult<Patent>;
}

/// Per-task execution context handed to a `TaskProcessor`.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Cancelled when the task's deadline passes or the queue shuts down.
    pub cancel: CancellationToken,
    pub deadline: Instant,
}

impl TaskContext {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, deadline: Instant::now() + timeout }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Work executed by queue workers.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: &Task, ctx: &TaskContext) -> anyhow::Result<()>;

    /// Called after a task ran past its deadline and was dropped.
    async fn abandon(&self, _task: &Task) {}
}

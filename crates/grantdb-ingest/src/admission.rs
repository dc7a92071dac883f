//! Front door for ingestion requests: validate, probe, claim, enqueue.
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use grantdb_core::{StoreError, Task};

use crate::downloader::Downloader;
use crate::link_guard::{Claim, LinkGuard};
use crate::queue::{QueueError, TaskQueue};

/// Why a request was turned away before any work was queued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("No link or directory given")]
    MissingTarget,

    #[error("Target {target} is unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("Target {target} was already submitted")]
    AlreadyClaimed { target: String },
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl AdmissionError {
    /// HTTP-style status for front ends that report one.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rejected(Rejection::MissingTarget) => 400,
            Self::Rejected(Rejection::Unreachable { .. }) => 404,
            Self::Rejected(Rejection::AlreadyClaimed { .. }) => 409,
            Self::Store(_) => 500,
            Self::Queue(_) => 503,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub task: Task,
    pub status_id: String,
}

impl Accepted {
    pub const STATUS_CODE: u16 = 202;

    pub fn message(&self) -> &'static str {
        "sent for processing"
    }
}

pub struct Admission {
    guard: Arc<LinkGuard>,
    downloader: Arc<Downloader>,
    queue: Arc<TaskQueue>,
}

impl Admission {
    pub fn new(guard: Arc<LinkGuard>, downloader: Arc<Downloader>, queue: Arc<TaskQueue>) -> Self {
        Self { guard, downloader, queue }
    }

    /// Validate, probe, claim and enqueue `task`. Never waits for queue room:
    /// a full queue is refused as `QueueError::Full` and the claim released.
    pub async fn request(&self, task: Task) -> Result<Accepted, AdmissionError> {
        if task.is_target_empty() {
            return Err(Rejection::MissingTarget.into());
        }
        let task = match task {
            Task::DownloadAndProcess { url } => Task::DownloadAndProcess { url: url.trim().to_string() },
            walk @ Task::WalkAndProcess { .. } => walk,
        };
        self.probe(&task).await?;

        let target = task.target();
        let status = match self.guard.claim_if_unseen(&target).await? {
            Claim::Claimed(status) => status,
            Claim::AlreadySeen(_) => return Err(Rejection::AlreadyClaimed { target }.into()),
        };
        if let Err(err) = self.queue.try_submit(task.clone()).await {
            // release the claim so the link can be submitted again
            if let Err(release) = self.guard.mark_failed(&status.id).await {
                warn!(link = %target, error = %release, "could not release claim after failed submit");
            }
            return Err(err.into());
        }
        info!(task = %task, status_id = %status.id, "task admitted");
        Ok(Accepted { task, status_id: status.id })
    }

    async fn probe(&self, task: &Task) -> Result<(), Rejection> {
        match task {
            Task::DownloadAndProcess { url } => self.downloader.probe(url).await.map_err(|err| Rejection::Unreachable {
                target: url.clone(),
                reason: err.to_string(),
            }),
            Task::WalkAndProcess { root } => match tokio::fs::metadata(root).await {
                Ok(meta) if meta.is_dir() => Ok(()),
                Ok(_) => Err(Rejection::Unreachable { target: task.target(), reason: "not a directory".to_string() }),
                Err(err) => Err(Rejection::Unreachable { target: task.target(), reason: err.to_string() }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use grantdb_core::config::DownloadSettings;
    use grantdb_core::{LinkState, TaskContext, TaskProcessor};
    use grantdb_store::MemoryDocumentStore;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct Noop;

    #[async_trait]
    impl TaskProcessor for Noop {
        async fn process(&self, _: &Task, _: &TaskContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn admission(store: Arc<MemoryDocumentStore>, staging: &std::path::Path) -> anyhow::Result<(Admission, Arc<TaskQueue>)> {
        admission_with_capacity(store, staging, 4)
    }

    fn admission_with_capacity(
        store: Arc<MemoryDocumentStore>,
        staging: &std::path::Path,
        capacity: usize,
    ) -> anyhow::Result<(Admission, Arc<TaskQueue>)> {
        let guard = Arc::new(LinkGuard::new(store));
        let downloader = Arc::new(Downloader::new(&DownloadSettings::default(), staging)?);
        let queue = Arc::new(TaskQueue::new(capacity, 1, Duration::from_secs(5), Arc::new(Noop)));
        Ok((Admission::new(guard, downloader, queue.clone()), queue))
    }

    #[tokio::test]
    async fn directory_requests_are_claimed_once() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = Arc::new(MemoryDocumentStore::new());
        let (admission, queue) = admission(store.clone(), tmp.path())?;
        queue.start(CancellationToken::new())?;

        let accepted = admission.request(Task::walk(tmp.path())).await?;
        assert_eq!(accepted.message(), "sent for processing");
        let again = admission.request(Task::walk(tmp.path())).await.expect_err("duplicate");
        assert_eq!(again.status_code(), 409);
        queue.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn invalid_targets_are_rejected_without_a_claim() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = Arc::new(MemoryDocumentStore::new());
        let (admission, _queue) = admission(store.clone(), tmp.path())?;

        let empty = admission.request(Task::download("   ")).await.expect_err("empty");
        assert_eq!(empty.status_code(), 400);

        let missing = admission.request(Task::walk(tmp.path().join("absent"))).await.expect_err("missing dir");
        assert_eq!(missing.status_code(), 404);

        let file = tmp.path().join("file.xml");
        std::fs::write(&file, "<a/>")?;
        let not_dir = admission.request(Task::walk(&file)).await.expect_err("not a dir");
        assert_eq!(not_dir.status_code(), 404);

        assert!(store.links().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_submit_releases_the_claim() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = Arc::new(MemoryDocumentStore::new());
        let (admission, queue) = admission(store.clone(), tmp.path())?;
        queue.stop().await;

        let err = admission.request(Task::walk(tmp.path())).await.expect_err("queue closed");
        assert_eq!(err.status_code(), 503);
        let links = store.links().await;
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].state, LinkState::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn full_queue_is_refused_without_waiting() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::create_dir_all(tmp.path().join("one"))?;
        std::fs::create_dir_all(tmp.path().join("two"))?;
        let store = Arc::new(MemoryDocumentStore::new());
        // workers never start, so the single slot stays taken
        let (admission, _queue) = admission_with_capacity(store.clone(), tmp.path(), 1)?;

        admission.request(Task::walk(tmp.path().join("one"))).await?;
        let refused = tokio::time::timeout(Duration::from_secs(1), admission.request(Task::walk(tmp.path().join("two"))))
            .await?
            .expect_err("queue full");
        assert!(matches!(refused, AdmissionError::Queue(QueueError::Full)));
        assert_eq!(refused.status_code(), 503);

        let states: Vec<LinkState> = store.links().await.into_iter().map(|l| l.state).collect();
        assert_eq!(states, vec![LinkState::Processed, LinkState::Failed]);
        Ok(())
    }
}

//! The `TaskProcessor` that turns a task into stored, indexed patents.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use walkdir::WalkDir;

use grantdb_core::{DocumentStore, LinkStatus, Patent, Task, TaskContext, TaskProcessor};
use grantdb_text::PatentIndex;

use crate::archive::Extractor;
use crate::downloader::Downloader;
use crate::error::{ArchiveError, IngestError};
use crate::link_guard::{link_hash, LinkGuard};
use crate::parser;

/// Outcome of walking one directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub indexed: usize,
    pub skipped: usize,
}

pub struct IngestProcessor {
    guard: Arc<LinkGuard>,
    downloader: Arc<Downloader>,
    extractor: Extractor,
    store: Arc<dyn DocumentStore>,
    index: Arc<PatentIndex>,
    extracted_dir: PathBuf,
}

impl IngestProcessor {
    pub fn new(
        guard: Arc<LinkGuard>,
        downloader: Arc<Downloader>,
        extractor: Extractor,
        store: Arc<dyn DocumentStore>,
        index: Arc<PatentIndex>,
        staging_dir: &Path,
    ) -> Self {
        Self { guard, downloader, extractor, store, index, extracted_dir: staging_dir.join("extracted") }
    }

    /// Fetch `url`, unpack it under the staging area and ingest the result.
    pub async fn download_and_process(&self, url: &str, ctx: &TaskContext) -> Result<WalkSummary, IngestError> {
        let archive = self.downloader.fetch(&ctx.cancel, url).await?;
        let dest_root = self.extracted_dir.join(link_hash(url));
        let extractor = self.extractor.clone();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract_recursively(&archive, &dest_root)).await??;
        self.walk_and_process(&extracted, ctx).await
    }

    /// Ingest every `.xml` file under `root`. A file that fails to decode is
    /// logged and skipped; storage and index failures abort the walk. The
    /// walk stops between files once `ctx` is cancelled or past its deadline.
    pub async fn walk_and_process(&self, root: &Path, ctx: &TaskContext) -> Result<WalkSummary, IngestError> {
        let dir = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || grant_files(&dir)).await??;
        let mut summary = WalkSummary::default();
        for path in files {
            if ctx.cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }
            if ctx.remaining().is_zero() {
                return Err(IngestError::DeadlineExceeded { done: summary.indexed + summary.skipped });
            }
            match self.ingest_file(&path).await {
                Ok(_) => summary.indexed += 1,
                Err(IngestError::Decode(err)) => {
                    warn!(path = %path.display(), error = %err, "skipping undecodable grant");
                    summary.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        info!(root = %root.display(), indexed = summary.indexed, skipped = summary.skipped, "walk finished");
        Ok(summary)
    }

    /// Parse, store raw, normalize, store normalized, index.
    pub async fn ingest_file(&self, path: &Path) -> Result<Patent, IngestError> {
        let file = path.to_path_buf();
        let raw = tokio::task::spawn_blocking(move || parser::parse(&file)).await??;
        let storage_id = self.store.insert_raw_record(&raw).await?;
        let patent = parser::normalize(&raw, &storage_id)?;
        self.store.insert_patent(&patent).await?;
        let index = self.index.clone();
        let indexed = patent.clone();
        tokio::task::spawn_blocking(move || index.index_patent(&indexed)).await??;
        Ok(patent)
    }

    async fn set_state(&self, status: &LinkStatus, outcome: &Result<WalkSummary, IngestError>) {
        let result = match outcome {
            Ok(_) => self.guard.mark_completed(&status.id).await,
            Err(_) => self.guard.mark_failed(&status.id).await,
        };
        if let Err(err) = result {
            warn!(status_id = %status.id, error = %err, "could not record link outcome");
        }
    }
}

#[async_trait]
impl TaskProcessor for IngestProcessor {
    async fn process(&self, task: &Task, ctx: &TaskContext) -> anyhow::Result<()> {
        let claim = self.guard.active(&task.target()).await?;
        if let Some(status) = &claim {
            if let Err(err) = self.guard.mark_processing(&status.id).await {
                warn!(status_id = %status.id, error = %err, "could not mark link processing");
            }
        }
        let outcome = match task {
            Task::DownloadAndProcess { url } => self.download_and_process(url, ctx).await,
            Task::WalkAndProcess { root } => self.walk_and_process(root, ctx).await,
        };
        if let Some(status) = &claim {
            self.set_state(status, &outcome).await;
        }
        outcome.map(|_| ()).map_err(Into::into)
    }

    async fn abandon(&self, task: &Task) {
        match self.guard.active(&task.target()).await {
            Ok(Some(status)) => {
                if let Err(err) = self.guard.mark_failed(&status.id).await {
                    warn!(status_id = %status.id, error = %err, "could not release abandoned link");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(task = %task, error = %err, "could not look up abandoned link"),
        }
    }
}

/// Regular files ending in `.xml` (any case), sorted.
fn grant_files(root: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        let is_xml = entry.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if entry.file_type().is_file() && is_xml {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

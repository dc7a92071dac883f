//! Wiring of store, index, guard, queue and admission from `Settings`.
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use grantdb_core::{DocumentStore, Settings};
use grantdb_store::LanceDocumentStore;
use grantdb_text::PatentIndex;

use crate::admission::Admission;
use crate::archive::Extractor;
use crate::downloader::Downloader;
use crate::error::IngestError;
use crate::link_guard::LinkGuard;
use crate::processor::IngestProcessor;
use crate::queue::TaskQueue;

pub struct Pipeline {
    pub store: Arc<dyn DocumentStore>,
    pub index: Arc<PatentIndex>,
    pub guard: Arc<LinkGuard>,
    pub queue: Arc<TaskQueue>,
    pub admission: Admission,
}

impl Pipeline {
    /// Open the LanceDB store and the patent index named by `settings`.
    pub async fn open(settings: &Settings) -> Result<Self, IngestError> {
        let store = LanceDocumentStore::open(&settings.store_dir(), &settings.storage).await?;
        Self::with_store(settings, Arc::new(store))
    }

    pub fn with_store(settings: &Settings, store: Arc<dyn DocumentStore>) -> Result<Self, IngestError> {
        let staging = settings.staging_dir();
        let index = Arc::new(
            PatentIndex::open(&settings.index_dir())?.with_limits(settings.search.default_limit, settings.search.max_limit),
        );
        let guard = Arc::new(LinkGuard::new(store.clone()));
        let downloader = Arc::new(Downloader::new(&settings.download, &staging)?);
        let processor = IngestProcessor::new(
            guard.clone(),
            downloader.clone(),
            Extractor::new(settings.extract.max_depth),
            store.clone(),
            index.clone(),
            &staging,
        );
        let queue = Arc::new(TaskQueue::new(
            settings.queue.capacity,
            settings.queue.worker_count(),
            settings.queue.task_timeout(),
            Arc::new(processor),
        ));
        let admission = Admission::new(guard.clone(), downloader, queue.clone());
        Ok(Self { store, index, guard, queue, admission })
    }

    pub fn start(&self, root: CancellationToken) -> Result<(), IngestError> {
        Ok(self.queue.start(root)?)
    }

    /// Stop accepting work and wait for queued tasks to finish.
    pub async fn shutdown(&self) {
        self.queue.stop().await;
    }
}

//! In-process `DocumentStore` kept behind a single async lock.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use grantdb_core::error::StoreResult;
use grantdb_core::{DocumentStore, LinkState, LinkStatus, Patent, RawRecord, StorageId, StoreError};

#[derive(Default)]
struct Tables {
    links: Vec<LinkStatus>,
    raw: HashMap<StorageId, RawRecord>,
    patents: HashMap<StorageId, Patent>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Tables>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn links(&self) -> Vec<LinkStatus> {
        self.inner.read().await.links.clone()
    }

    pub async fn raw_record_count(&self) -> usize {
        self.inner.read().await.raw.len()
    }

    pub async fn patents(&self) -> Vec<Patent> {
        self.inner.read().await.patents.values().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_active_link(&self, link_hash: &str) -> StoreResult<Option<LinkStatus>> {
        let tables = self.inner.read().await;
        Ok(tables
            .links
            .iter()
            .filter(|s| s.link_hash == link_hash && s.state.blocks_claim())
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn insert_link(&self, status: &LinkStatus) -> StoreResult<()> {
        self.inner.write().await.links.push(status.clone());
        Ok(())
    }

    async fn set_link_state(&self, id: &str, state: LinkState) -> StoreResult<()> {
        let mut tables = self.inner.write().await;
        let status = tables
            .links
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("links/{id}")))?;
        status.state = state;
        status.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_raw_record(&self, record: &RawRecord) -> StoreResult<StorageId> {
        let id = Uuid::new_v4().to_string();
        self.inner.write().await.raw.insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn raw_record(&self, id: &str) -> StoreResult<RawRecord> {
        self.inner.read().await.raw.get(id).cloned().ok_or_else(|| StoreError::NotFound(format!("raw_records/{id}")))
    }

    async fn insert_patent(&self, patent: &Patent) -> StoreResult<()> {
        self.inner.write().await.patents.insert(patent.storage_id.clone(), patent.clone());
        Ok(())
    }

    async fn patent(&self, storage_id: &str) -> StoreResult<Patent> {
        self.inner
            .read()
            .await
            .patents
            .get(storage_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("patents/{storage_id}")))
    }
}

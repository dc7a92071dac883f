//! LanceDB-backed document store.
//!
//! Three tables: link statuses, raw records and normalized patents. Records
//! are kept as JSON next to a few plain columns used for filtering. Every call
//! is bounded by the configured storage timeout.
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arrow_array::{RecordBatch, StringArray, TimestampMillisecondArray};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lancedb::Connection;
use tracing::debug;
use uuid::Uuid;

use grantdb_core::config::StorageSettings;
use grantdb_core::error::StoreResult;
use grantdb_core::{DocumentStore, LinkState, LinkStatus, Patent, RawRecord, StorageId, StoreError};

use crate::schema::{build_link_schema, build_patent_schema, build_raw_schema};
use crate::table::{append, ensure_table, open_db, quote, select, string_col, timestamp_col, upsert};

pub struct LanceDocumentStore {
    conn: Connection,
    tables: StorageSettings,
    timeout: Duration,
}

impl LanceDocumentStore {
    /// Open (creating if needed) the database at `dir` and its three tables.
    pub async fn open(dir: &Path, settings: &StorageSettings) -> StoreResult<Self> {
        std::fs::create_dir_all(dir).map_err(StoreError::backend)?;
        let uri = dir.to_string_lossy().to_string();
        let conn = open_db(&uri).await.map_err(StoreError::backend)?;
        ensure_table(&conn, &settings.link_table, build_link_schema()).await.map_err(StoreError::backend)?;
        ensure_table(&conn, &settings.raw_table, build_raw_schema()).await.map_err(StoreError::backend)?;
        ensure_table(&conn, &settings.patent_table, build_patent_schema()).await.map_err(StoreError::backend)?;
        debug!(uri = %uri, "document store opened");
        Ok(Self { conn, tables: settings.clone(), timeout: settings.timeout() })
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::backend),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    async fn first_document(&self, table: &str, key: &str, id: &str) -> StoreResult<String> {
        let filter = format!("{key} = {}", quote(id));
        let batches = self.bounded(select(&self.conn, table, &filter, Some(1))).await?;
        for batch in &batches {
            let docs = string_col(batch, "document").map_err(StoreError::backend)?;
            if batch.num_rows() > 0 {
                return Ok(docs.value(0).to_string());
            }
        }
        Err(StoreError::NotFound(format!("{table}/{id}")))
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn link_rows(batch: &RecordBatch) -> anyhow::Result<Vec<LinkStatus>> {
    let ids = string_col(batch, "id")?;
    let hashes = string_col(batch, "link_hash")?;
    let states = string_col(batch, "status")?;
    let created = timestamp_col(batch, "created_at")?;
    let updated = timestamp_col(batch, "updated_at")?;
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let state = states.value(i).parse::<LinkState>().map_err(anyhow::Error::msg)?;
        out.push(LinkStatus {
            id: ids.value(i).to_string(),
            link_hash: hashes.value(i).to_string(),
            state,
            created_at: from_millis(created.value(i)),
            updated_at: from_millis(updated.value(i)),
        });
    }
    Ok(out)
}

fn link_batch(status: &LinkStatus) -> anyhow::Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        build_link_schema(),
        vec![
            Arc::new(StringArray::from(vec![status.id.clone()])),
            Arc::new(StringArray::from(vec![status.link_hash.clone()])),
            Arc::new(StringArray::from(vec![status.state.as_str()])),
            Arc::new(TimestampMillisecondArray::from(vec![millis(status.created_at)])),
            Arc::new(TimestampMillisecondArray::from(vec![millis(status.updated_at)])),
        ],
    )?)
}

#[async_trait]
impl DocumentStore for LanceDocumentStore {
    async fn find_active_link(&self, link_hash: &str) -> StoreResult<Option<LinkStatus>> {
        let states = LinkState::BLOCKING.iter().map(|s| quote(s.as_str())).collect::<Vec<_>>().join(", ");
        let filter = format!("link_hash = {} AND status IN ({states})", quote(link_hash));
        let batches = self.bounded(select(&self.conn, &self.tables.link_table, &filter, None)).await?;
        let mut found = Vec::new();
        for batch in &batches {
            found.extend(link_rows(batch).map_err(StoreError::backend)?);
        }
        Ok(found.into_iter().max_by_key(|s| s.updated_at))
    }

    async fn insert_link(&self, status: &LinkStatus) -> StoreResult<()> {
        let batch = link_batch(status).map_err(StoreError::backend)?;
        self.bounded(append(&self.conn, &self.tables.link_table, batch)).await
    }

    async fn set_link_state(&self, id: &str, state: LinkState) -> StoreResult<()> {
        let filter = format!("id = {}", quote(id));
        let batches = self.bounded(select(&self.conn, &self.tables.link_table, &filter, Some(1))).await?;
        let mut current = None;
        for batch in &batches {
            current = link_rows(batch).map_err(StoreError::backend)?.into_iter().next();
            if current.is_some() {
                break;
            }
        }
        let Some(mut status) = current else {
            return Err(StoreError::NotFound(format!("{}/{id}", self.tables.link_table)));
        };
        status.state = state;
        status.updated_at = Utc::now();
        let batch = link_batch(&status).map_err(StoreError::backend)?;
        self.bounded(upsert(&self.conn, &self.tables.link_table, "id", batch)).await
    }

    async fn insert_raw_record(&self, record: &RawRecord) -> StoreResult<StorageId> {
        let id = Uuid::new_v4().to_string();
        let document = serde_json::to_string(&record.root)?;
        let batch = RecordBatch::try_new(
            build_raw_schema(),
            vec![
                Arc::new(StringArray::from(vec![id.clone()])),
                Arc::new(StringArray::from(vec![record.source.clone()])),
                Arc::new(StringArray::from(vec![document])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
            ],
        )
        .map_err(StoreError::backend)?;
        self.bounded(append(&self.conn, &self.tables.raw_table, batch)).await?;
        Ok(id)
    }

    async fn raw_record(&self, id: &str) -> StoreResult<RawRecord> {
        let filter = format!("id = {}", quote(id));
        let batches = self.bounded(select(&self.conn, &self.tables.raw_table, &filter, Some(1))).await?;
        for batch in &batches {
            let sources = string_col(batch, "source").map_err(StoreError::backend)?;
            let docs = string_col(batch, "document").map_err(StoreError::backend)?;
            if batch.num_rows() > 0 {
                return Ok(RawRecord { source: sources.value(0).to_string(), root: serde_json::from_str(docs.value(0))? });
            }
        }
        Err(StoreError::NotFound(format!("{}/{id}", self.tables.raw_table)))
    }

    async fn insert_patent(&self, patent: &Patent) -> StoreResult<()> {
        let document = serde_json::to_string(patent)?;
        let batch = RecordBatch::try_new(
            build_patent_schema(),
            vec![
                Arc::new(StringArray::from(vec![patent.storage_id.clone()])),
                Arc::new(StringArray::from(vec![patent.number.clone()])),
                Arc::new(StringArray::from(vec![patent.title.clone()])),
                Arc::new(StringArray::from(vec![document])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
            ],
        )
        .map_err(StoreError::backend)?;
        self.bounded(append(&self.conn, &self.tables.patent_table, batch)).await
    }

    async fn patent(&self, storage_id: &str) -> StoreResult<Patent> {
        let document = self.first_document(&self.tables.patent_table, "storage_id", storage_id).await?;
        Ok(serde_json::from_str(&document)?)
    }
}

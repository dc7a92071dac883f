//! LanceDB connection and table housekeeping helpers.
use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

pub async fn append(conn: &Connection, table: &str, batch: RecordBatch) -> Result<()> {
    let t = conn.open_table(table).execute().await?;
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    t.add(reader).execute().await?;
    Ok(())
}

/// All batches matching `filter`, optionally capped at `limit` rows.
pub async fn select(conn: &Connection, table: &str, filter: &str, limit: Option<usize>) -> Result<Vec<RecordBatch>> {
    let t = conn.open_table(table).execute().await?;
    let mut query = t.query().only_if(filter);
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    let mut stream = query.execute().await?;
    let mut out = Vec::new();
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        if batch.num_rows() > 0 {
            out.push(batch);
        }
    }
    Ok(out)
}

/// Insert or replace rows keyed by `key`.
pub async fn upsert(conn: &Connection, table: &str, key: &str, batch: RecordBatch) -> Result<()> {
    let t = conn.open_table(table).execute().await?;
    let schema = batch.schema();
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    let mut mi = t.merge_insert(&[key]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    let _ = mi.execute(reader).await?;
    Ok(())
}

pub fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("{name} column missing"))
}

pub fn timestamp_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a TimestampMillisecondArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
        .ok_or_else(|| anyhow::anyhow!("{name} column missing"))
}

/// Quote a value for use inside a single-quoted SQL literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

//! Arrow schemas for the three store tables.
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

fn timestamp(name: &str) -> Field {
	Field::new(name, DataType::Timestamp(TimeUnit::Millisecond, None), false)
}

pub fn build_link_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("link_hash", DataType::Utf8, false),
		Field::new("status", DataType::Utf8, false),
		timestamp("created_at"),
		timestamp("updated_at"),
	]))
}

/// `document` holds the JSON-encoded element tree.
pub fn build_raw_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("document", DataType::Utf8, false),
		timestamp("created_at"),
	]))
}

/// `number` and `title` are denormalized for ad-hoc scans; `document` is authoritative.
pub fn build_patent_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("storage_id", DataType::Utf8, false),
		Field::new("number", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("document", DataType::Utf8, false),
		timestamp("created_at"),
	]))
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
	#[error("Search query is empty")]
	EmptyQuery,

	#[error("Invalid search query: {0}")]
	Query(#[from] tantivy::query::QueryParserError),

	#[error("Patent has no storage id")]
	MissingId,

	#[error("Indexed document {id} has no stored patent")]
	MissingBlob { id: String },

	#[error("Stored patent for {id} could not be decoded: {source}")]
	CorruptBlob { id: String, source: serde_json::Error },

	#[error("Patent could not be serialized: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Index directory unavailable: {0}")]
	Directory(#[from] tantivy::directory::error::OpenDirectoryError),

	#[error("Index engine failed: {0}")]
	Engine(#[from] tantivy::TantivyError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("Index writer lock poisoned")]
	Poisoned,
}

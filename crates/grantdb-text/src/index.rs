use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, error};

use grantdb_core::Patent;

use crate::error::IndexError;
use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;
const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

struct Fields {
	id: Field,
	number: Field,
	title: Field,
	inventors: Field,
	assignee: Field,
	classification: Field,
	application_date: Field,
	issue_date: Field,
	blob: Field,
}

impl Fields {
	fn resolve(schema: &Schema) -> Result<Self, IndexError> {
		Ok(Self {
			id: schema.get_field("id")?,
			number: schema.get_field("number")?,
			title: schema.get_field("title")?,
			inventors: schema.get_field("inventors")?,
			assignee: schema.get_field("assignee")?,
			classification: schema.get_field("classification")?,
			application_date: schema.get_field("application_date")?,
			issue_date: schema.get_field("issue_date")?,
			blob: schema.get_field("blob")?,
		})
	}
}

/// Full-text index over normalized patents.
///
/// One writer is held for the life of the index; every `index_patent` call is
/// its own commit, so a patent becomes searchable (blob included) as soon as
/// the call returns and never partially.
pub struct PatentIndex {
	index: Index,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	fields: Fields,
	default_limit: usize,
	max_limit: usize,
}

impl PatentIndex {
	/// Open the index in `dir`, creating it when the directory holds none.
	pub fn open(dir: &Path) -> Result<Self, IndexError> {
		std::fs::create_dir_all(dir)?;
		let directory = MmapDirectory::open(dir)?;
		let index = Index::open_or_create(directory, build_schema())?;
		register_tokenizer(&index);
		let fields = Fields::resolve(&index.schema())?;
		let writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		debug!(dir = %dir.display(), docs = reader.searcher().num_docs(), "patent index opened");
		Ok(Self { index, reader, writer: Mutex::new(writer), fields, default_limit: DEFAULT_LIMIT, max_limit: MAX_LIMIT })
	}

	/// Override result limits; `default_limit` is clamped to `max_limit`.
	#[must_use]
	pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
		self.max_limit = max_limit.max(1);
		self.default_limit = default_limit.clamp(1, self.max_limit);
		self
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	/// Index (or re-index) a patent under its storage id.
	pub fn index_patent(&self, patent: &Patent) -> Result<(), IndexError> {
		if patent.storage_id.is_empty() {
			return Err(IndexError::MissingId);
		}
		let blob = serde_json::to_string(patent)?;
		let document = doc!(
			self.fields.id => patent.storage_id.clone(),
			self.fields.number => patent.number.clone(),
			self.fields.title => patent.title.clone(),
			self.fields.inventors => patent.inventor_names.join("; "),
			self.fields.assignee => patent.assignee_name.clone(),
			self.fields.classification => patent.classification.symbol(),
			self.fields.application_date => patent.application_date.clone(),
			self.fields.issue_date => patent.issue_date.clone(),
			self.fields.blob => blob
		);
		let id_term = Term::from_field_text(self.fields.id, &patent.storage_id);
		{
			let mut writer = self.writer.lock().map_err(|_| IndexError::Poisoned)?;
			if let Err(err) = replace_and_commit(&mut writer, id_term, document) {
				// drop the pending delete so a later commit cannot apply it alone
				let _ = writer.rollback();
				return Err(err.into());
			}
		}
		self.reader.reload()?;
		debug!(storage_id = %patent.storage_id, number = %patent.number, "patent indexed");
		Ok(())
	}

	pub fn search(&self, query: &str) -> Result<Vec<Patent>, IndexError> {
		self.search_with_limit(query, self.default_limit)
	}

	/// Run `query` and resolve each hit to its stored patent, best first.
	/// Zero hits is an empty list, not an error.
	pub fn search_with_limit(&self, query: &str, limit: usize) -> Result<Vec<Patent>, IndexError> {
		let query = query.trim();
		if query.is_empty() {
			return Err(IndexError::EmptyQuery);
		}
		let limit = limit.clamp(1, self.max_limit);
		let searcher = self.reader.searcher();
		let parser = QueryParser::for_index(
			&self.index,
			vec![self.fields.title, self.fields.inventors, self.fields.assignee, self.fields.number, self.fields.classification],
		);
		let parsed = parser.parse_query(query)?;
		let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;
		let mut patents = Vec::with_capacity(top_docs.len());
		for (_score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(self.fields.id).and_then(|v| v.as_str()).unwrap_or_default().to_string();
			let Some(blob) = doc.get_first(self.fields.blob).and_then(|v| v.as_str()) else {
				error!(storage_id = %id, "index hit has no stored blob");
				return Err(IndexError::MissingBlob { id });
			};
			let patent: Patent = serde_json::from_str(blob).map_err(|source| {
				error!(storage_id = %id, error = %source, "index hit has an undecodable blob");
				IndexError::CorruptBlob { id, source }
			})?;
			patents.push(patent);
		}
		debug!(query, hits = patents.len(), "search finished");
		Ok(patents)
	}
}

fn replace_and_commit(writer: &mut IndexWriter, id_term: Term, document: TantivyDocument) -> tantivy::Result<()> {
	writer.delete_term(id_term);
	writer.add_document(document)?;
	writer.commit()?;
	Ok(())
}

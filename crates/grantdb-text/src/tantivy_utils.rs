use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER: &str = "patent_text";

/// Field layout of the patent index. `blob` is stored only, never searched.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _id = schema_builder.add_text_field("id", STRING | STORED);
	let _number = schema_builder.add_text_field("number", STRING);
	let _title = schema_builder.add_text_field("title", text_options.clone());
	let _inventors = schema_builder.add_text_field("inventors", text_options.clone());
	let _assignee = schema_builder.add_text_field("assignee", text_options);
	let _classification = schema_builder.add_text_field("classification", STRING);
	let _application_date = schema_builder.add_text_field("application_date", STRING);
	let _issue_date = schema_builder.add_text_field("issue_date", STRING);
	let _blob = schema_builder.add_text_field("blob", STORED);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = [
		"a","an","and","are","as","at","be","by","for","from","has","in","is","it","its","of","on","that","the","to","was","will","with","or","not","this","these","their","there","than","so","if","when","where","which","who","can","may","have","had",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(ToString::to_string)))
		.build();
	index.tokenizers().register(TOKENIZER, tokenizer);
}

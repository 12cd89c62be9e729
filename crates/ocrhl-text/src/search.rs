use anyhow::Result;
use serde::Serialize;
use tantivy::{Index, collector::TopDocs, query::QueryParser, TantivyDocument};
use tantivy::schema::Value;
use tracing::debug;

use ocrhl_core::config::HighlightConfig;
use ocrhl_core::traits::OcrFormat;
use ocrhl_core::types::Snippet;

use crate::document::MappedDocument;
use crate::highlighter::FieldHighlighter;
use crate::tantivy_utils::{ocr_analyzer, register_tokenizer, AnalyzedOccurrences, ID_FIELD, PATH_FIELD, TEXT_FIELD};

pub struct OcrSearchEngine {
	index: Index,
	searcher: tantivy::Searcher,
	format: Box<dyn OcrFormat>,
	id_field: tantivy::schema::Field,
	text_field: tantivy::schema::Field,
	path_field: tantivy::schema::Field,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
	pub score: f32,
	pub id: String,
	pub path: String,
	pub snippets: Vec<Snippet>,
}

impl OcrSearchEngine {
	pub fn new(index_dir: std::path::PathBuf, format: Box<dyn OcrFormat>) -> Result<Self, anyhow::Error> {
		let index = Index::open_in_dir(&index_dir)?;
		register_tokenizer(&index);
		let reader = index.reader()?; let searcher = reader.searcher();
		let schema = index.schema();
		let id_field = schema.get_field(ID_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;
		let path_field = schema.get_field(PATH_FIELD)?;
		Ok(Self { index, searcher, format, id_field, text_field, path_field })
	}

	/// Top `limit` documents for `query_text`, each with OCR snippets cut from
	/// its source file.
	pub fn search(&self, query_text: &str, limit: usize, cfg: &HighlightConfig) -> Result<Vec<SearchResult>, anyhow::Error> {
		let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
		let query = query_parser.parse_query(query_text)?;
		let top_docs = self.searcher.search(&query, &TopDocs::with_limit(limit))?;
		let highlighter = FieldHighlighter::from_config(self.format.as_ref(), TEXT_FIELD, cfg)?;
		let mut occurrences = AnalyzedOccurrences::from_query(ocr_analyzer(), query.as_ref(), self.text_field);
		// the index only holds alternative readings when it was built with them
		if let (false, Some(separator)) = (cfg.expand_alternatives, self.format.alternative_separator()) {
			occurrences = occurrences.primary_readings_only(separator);
		}
		debug!(query = query_text, hits = top_docs.len(), "highlighting hits");
		let mut results = Vec::new();
		for (score, doc_address) in top_docs {
			let doc: TantivyDocument = self.searcher.doc(doc_address)?;
			let id = doc.get_first(self.id_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			let path = doc.get_first(self.path_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			let content = MappedDocument::open(&path)?;
			let snippets = highlighter.highlight(&content, &occurrences)?;
			results.push(SearchResult { score, id, path, snippets });
		}
		Ok(results)
	}
}

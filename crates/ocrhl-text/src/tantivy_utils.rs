use std::collections::HashMap;
use std::sync::Arc;

use tantivy::query::Query;
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};
use tantivy::Index;

use ocrhl_core::error::Result;
use ocrhl_core::text::{CharView, Utf8View};
use ocrhl_core::traits::{OccurrenceCursor, OccurrenceSource};
use ocrhl_core::types::{ByteOffset, CharOffset, MatchOccurrence, TermRef};

use crate::occurrences::VecOccurrences;

pub const OCR_TOKENIZER: &str = "ocr_text";
pub const ID_FIELD: &str = "id";
pub const PATH_FIELD: &str = "doc_path";
pub const FORMAT_FIELD: &str = "format";
pub const TEXT_FIELD: &str = "ocr_text";

/// Schema for OCR documents. The text is indexed but not stored: snippets are
/// cut from the source file at query time.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _id_field = schema_builder.add_text_field(ID_FIELD, STRING | STORED);
	let _doc_path_field = schema_builder.add_text_field(PATH_FIELD, STRING | STORED);
	let _format_field = schema_builder.add_text_field(FORMAT_FIELD, STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(OCR_TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field(TEXT_FIELD, text_options);
	schema_builder.build()
}

pub fn ocr_analyzer() -> TextAnalyzer {
	let stop_words = vec![
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(OCR_TOKENIZER, ocr_analyzer());
}

/// Text of every term `query` looks up in `field`.
pub fn query_terms(query: &dyn Query, field: Field) -> Vec<String> {
	let mut terms = Vec::new();
	query.query_terms(&mut |term, _needs_positions| {
		if term.field() == field {
			if let Some(text) = term.value().as_str() {
				terms.push(text.to_string());
			}
		}
	});
	terms.sort();
	terms.dedup();
	terms
}

/// Finds query-term occurrences by re-analyzing the document text with the
/// field's analyzer. Token offsets from tantivy are UTF-8 byte offsets.
#[derive(Clone)]
pub struct AnalyzedOccurrences {
	analyzer: TextAnalyzer,
	terms: HashMap<String, TermRef>,
	alternative_separator: Option<char>,
}

impl AnalyzedOccurrences {
	pub fn new(analyzer: TextAnalyzer, terms: impl IntoIterator<Item = String>) -> Self {
		let terms = terms.into_iter().map(|t| { let r: TermRef = Arc::from(t.as_str()); (t, r) }).collect();
		Self { analyzer, terms, alternative_separator: None }
	}

	pub fn from_query(analyzer: TextAnalyzer, query: &dyn Query, field: Field) -> Self {
		Self::new(analyzer, query_terms(query, field))
	}

	/// Ignore alternative readings, i.e. tokens that follow `separator`
	/// inside the same whitespace-delimited word, matching an index built
	/// without them.
	pub fn primary_readings_only(mut self, separator: char) -> Self {
		self.alternative_separator = Some(separator);
		self
	}

	pub fn is_empty(&self) -> bool { self.terms.is_empty() }

	fn collect(&self, text: &str) -> Vec<MatchOccurrence<ByteOffset>> {
		if self.terms.is_empty() { return Vec::new(); }
		let mut analyzer = self.analyzer.clone();
		let mut stream = analyzer.token_stream(text);
		let mut found: Vec<(usize, TermRef)> = Vec::new();
		while stream.advance() {
			let token = stream.token();
			let Some(term) = self.terms.get(&token.text) else { continue };
			if self.alternative_separator.is_some_and(|sep| is_alternative_reading(text, token.offset_from, sep)) { continue; }
			found.push((token.offset_from, term.clone()));
		}
		let mut freqs: HashMap<TermRef, u32> = HashMap::new();
		for (_, term) in &found { *freqs.entry(term.clone()).or_default() += 1; }
		found
			.into_iter()
			.map(|(offset, term)| { let term_freq = freqs.get(&term).copied().unwrap_or(1); MatchOccurrence { offset: ByteOffset(offset), term, term_freq } })
			.collect()
	}
}

fn is_alternative_reading(text: &str, offset: usize, separator: char) -> bool {
	text[..offset].chars().rev().take_while(|c| !c.is_whitespace()).any(|c| c == separator)
}

impl OccurrenceSource for AnalyzedOccurrences {
	fn byte_occurrences<'a>(&'a self, text: &'a Utf8View<'a>) -> Result<Box<dyn OccurrenceCursor<ByteOffset> + 'a>> {
		Ok(Box::new(VecOccurrences::new(self.collect(text.as_str()))))
	}

	fn char_occurrences<'a>(&'a self, text: &'a CharView) -> Result<Box<dyn OccurrenceCursor<CharOffset> + 'a>> {
		let owned: String = text.chars().iter().collect();
		let view = Utf8View::new(&owned);
		let occurrences = self
			.collect(&owned)
			.into_iter()
			.map(|o| MatchOccurrence { offset: view.byte_to_char(o.offset), term: o.term, term_freq: o.term_freq })
			.collect();
		Ok(Box::new(VecOccurrences::new(occurrences)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn analyzer_drops_stop_words_and_lowercases() {
		let occurrences = AnalyzedOccurrences::new(ocr_analyzer(), vec!["köln".to_string(), "the".to_string()]);
		let found = occurrences.collect("The Dom in Köln, the river at KÖLN");
		let offsets: Vec<usize> = found.iter().map(|o| o.offset.0).collect();
		assert_eq!(offsets, vec![11, 31]);
		assert!(found.iter().all(|o| o.term_freq == 2));
	}

	#[test]
	fn alternative_readings_can_be_ignored() {
		let text = "Die Stadt Mûnchen⇿München⇿Miinchen feiert in München";
		let all = AnalyzedOccurrences::new(ocr_analyzer(), vec!["münchen".to_string()]);
		assert_eq!(all.collect(text).len(), 2);
		let primary = all.clone().primary_readings_only('⇿');
		let found = primary.collect(text);
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].offset.0, text.rfind("München").expect("last"));
		assert_eq!(found[0].term_freq, 1);
	}

	#[test]
	fn char_occurrences_translate_offsets() {
		let occurrences = AnalyzedOccurrences::new(ocr_analyzer(), vec!["straße".to_string()]);
		let text = CharView::from("Große Straße");
		let mut cursor = occurrences.char_occurrences(&text).expect("cursor");
		let first = cursor.next_occurrence().expect("next").expect("some");
		assert_eq!(first.offset, CharOffset(6));
		assert!(cursor.next_occurrence().expect("next").is_none());
	}
}

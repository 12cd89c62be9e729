//! ocrhl-text
//!
//! OCR passage highlighting: passage building and scoring over byte or
//! character offsets, the plain-text OCR dialect, and Tantivy-backed indexing
//! and search that returns snippets with page coordinates.

pub mod document;
pub mod highlighter;
pub mod index;
pub mod occurrences;
pub mod passage;
pub mod plaintext;
pub mod search;
pub mod segment;
pub mod tantivy_utils;

pub use document::{InMemoryDocument, MappedDocument};
pub use highlighter::FieldHighlighter;
pub use index::OcrIndexer;
pub use passage::{PassageBuilder, PassageScorer};
pub use plaintext::PlainTextFormat;
pub use search::{OcrSearchEngine, SearchResult};

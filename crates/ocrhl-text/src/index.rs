use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tantivy::{doc, Index};
use tracing::{debug, info, warn};

use ocrhl_core::traits::OcrFormat;

use crate::tantivy_utils::{build_schema, register_tokenizer, FORMAT_FIELD, ID_FIELD, PATH_FIELD, TEXT_FIELD};

const SNIFF_BYTES: u64 = 4096;

/// Indexes the decoded text of every OCR file under a directory. The source
/// files are left in place; snippets are cut from them at query time.
pub struct OcrIndexer {
	index: Index,
	format: Box<dyn OcrFormat>,
	expand_alternatives: bool,
	id_field: tantivy::schema::Field,
	text_field: tantivy::schema::Field,
	path_field: tantivy::schema::Field,
	format_field: tantivy::schema::Field,
}

impl OcrIndexer {
	pub fn new(index_dir: std::path::PathBuf, format: Box<dyn OcrFormat>, expand_alternatives: bool) -> Result<Self, anyhow::Error> {
		let schema = build_schema();
		if index_dir.exists() { std::fs::remove_dir_all(&index_dir)?; }
		std::fs::create_dir_all(&index_dir)?;
		let index = Index::create_in_dir(&index_dir, schema.clone())?;
		register_tokenizer(&index);
		let id_field = schema.get_field(ID_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;
		let path_field = schema.get_field(PATH_FIELD)?;
		let format_field = schema.get_field(FORMAT_FIELD)?;
		Ok(Self { index, format, expand_alternatives, id_field, text_field, path_field, format_field })
	}

	pub fn index_files(&self, data_dir: &Path) -> Result<usize, anyhow::Error> {
		let mut index_writer = self.index.writer(50_000_000)?;
		let mut file_count = 0;
		for entry in walkdir::WalkDir::new(data_dir).into_iter().filter_map(|e| e.ok()) {
			if !(entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "txt")) { continue; }
			let file_path = entry.path();
			let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
			if !self.sniff_file(file_path)? {
				debug!(path = %file_path.display(), format = self.format.name(), "skipping file in another format");
				continue;
			}
			let content = match self.decode_file(file_path) {
				Ok(content) => content,
				Err(e) => { warn!(path = %file_path.display(), error = %e, "failed to decode"); continue; }
			};
			let doc = doc!(
				self.id_field => relative_path.display().to_string(),
				self.text_field => content,
				self.path_field => file_path.to_string_lossy().to_string(),
				self.format_field => self.format.name()
			);
			index_writer.add_document(doc)?;
			file_count += 1;
		}
		index_writer.commit()?;
		info!(files = file_count, dir = %data_dir.display(), "indexed OCR documents");
		Ok(file_count)
	}

	fn sniff_file(&self, path: &Path) -> Result<bool, anyhow::Error> {
		let mut chunk = Vec::new();
		File::open(path)?.take(SNIFF_BYTES).read_to_end(&mut chunk)?;
		Ok(self.format.sniff(&String::from_utf8_lossy(&chunk)))
	}

	fn decode_file(&self, path: &Path) -> Result<String, anyhow::Error> {
		let reader = BufReader::new(File::open(path)?);
		let mut text = String::new();
		self.format.decoder(Box::new(reader), self.expand_alternatives).read_to_string(&mut text)?;
		Ok(text)
	}
}

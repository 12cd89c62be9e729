use std::fs;
use std::path::Path;

use ocrhl_core::config::HighlightConfig;
use ocrhl_core::types::OcrBlock;
use ocrhl_text::{OcrIndexer, OcrSearchEngine, PlainTextFormat};
use tempfile::TempDir;
use walkdir::WalkDir;

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir.join("zeitung/1850")).unwrap();
    fs::write(
        dir.join("zeitung/1850/seite1.txt"),
        "Kölnische Zeitung\n\nDer Dom zu Köln wird weitergebaut.\nMan erwartet viele Besucher.\x0cZweite Seite\n\nDie Stadt Mûnchen⇿München feiert.\n",
    )
    .unwrap();
    fs::write(dir.join("zeitung/1850/seite2.txt"), "Nachrichten aus Berlin\n\nDer König reist nach Köln.\n").unwrap();
    fs::write(dir.join("notizen.txt"), "Keine Treffer hier.\n").unwrap();
    fs::write(dir.join("alto.txt"), "<?xml version=\"1.0\"?><alto></alto>\n").unwrap();
    fs::write(dir.join("readme.md"), "Köln\n").unwrap();
}

#[test]
fn ocr_full_flow() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("txt");
    let index_dir = tmp.path().join("indexes/tantivy");
    write_corpus(&data_dir);

    let txt_files = WalkDir::new(&data_dir).into_iter().filter_map(|e| e.ok()).filter(|e| e.path().extension().is_some_and(|ext| ext == "txt")).count();
    let indexer = OcrIndexer::new(index_dir.clone(), Box::new(PlainTextFormat::default()), true).expect("indexer");
    let count = indexer.index_files(&data_dir).expect("index files");
    // the ALTO export is sniffed out
    assert_eq!(count, txt_files - 1);

    let engine = OcrSearchEngine::new(index_dir, Box::new(PlainTextFormat::default())).expect("engine");
    let cfg = HighlightConfig { context_block: OcrBlock::Line, context_size: 1, expand_alternatives: true, ..HighlightConfig::default() };

    let results = engine.search("köln", 10, &cfg).expect("search");
    assert_eq!(results.len(), 2);
    assert!(results[0].score >= results[1].score);
    for r in &results {
        assert_eq!(r.snippets.len(), 1);
        assert!(r.snippets[0].text.contains("<em>Köln</em>"), "{}", r.snippets[0].text);
        assert!(r.path.ends_with(&r.id));
    }

    // the alternative reading is indexed and highlighted in the page it sits on
    let results = engine.search("münchen", 10, &cfg).expect("search");
    assert_eq!(results.len(), 1);
    let snippet = &results[0].snippets[0];
    assert_eq!(snippet.page, Some(1));
    assert_eq!(snippet.text, "Die Stadt Mûnchen⇿<em>München</em> feiert.");

    // restricted to the first page the hit falls back to a summary of that page
    let first_page = HighlightConfig { page: Some(0), ..cfg.clone() };
    let results = engine.search("münchen", 10, &first_page).expect("search");
    assert_eq!(results[0].snippets[0].page, Some(0));
    assert!(results[0].snippets[0].highlights.is_empty());

    assert!(engine.search("zürich", 10, &cfg).expect("search").is_empty());
    let json = serde_json::to_string(&engine.search("könig", 10, &cfg).expect("search")).expect("json");
    assert!(json.contains("\"snippets\""));
}

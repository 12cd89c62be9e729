use std::env;
use std::path::PathBuf;

use ocrhl_core::config::{expand_path, Config};
use ocrhl_text::{OcrIndexer, OcrSearchEngine, PlainTextFormat};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() { eprintln!("Usage: {} <ingest|query> [args...]", prog); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let (cmd, args) = parse_args();
    let index_dir = expand_path(config.get::<String>("data.tantivy_index_dir").unwrap_or_else(|_| "../dev_data/indexes/tantivy".to_string()));
    match cmd.as_str() {
        "ingest" => {
            let data_dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                let dir: String = config.get("data.raw_txt_dir").unwrap_or_else(|_| "../dev_data/txt".to_string()); expand_path(dir)
            });
            let expand_alternatives = config.highlight()?.expand_alternatives;
            info!(data_dir = %data_dir.display(), index_dir = %index_dir.display(), "ingesting");
            let indexer = OcrIndexer::new(index_dir, Box::new(PlainTextFormat::default()), expand_alternatives)?;
            let count = indexer.index_files(&data_dir)?;
            println!("✅ Ingest complete ({} documents)", count);
        }
        "query" => {
            let query_text = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: ocrhl query \"<query>\" [--limit N] [--page P]"); std::process::exit(1)
            });
            let mut limit = 10;
            let mut page = None;
            let mut i = 1; while i < args.len() { match args[i].as_str() {
                "--limit" | "-n" => { if let Some(n) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) { limit = n; i += 1; } else { eprintln!("Error: --limit requires a number"); std::process::exit(1); } }
                "--page" | "-p" => { if let Some(p) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) { page = Some(p); i += 1; } else { eprintln!("Error: --page requires a number"); std::process::exit(1); } }
                other => { eprintln!("Unknown option: {}", other); std::process::exit(1); } } i += 1; }
            let mut highlight = config.highlight()?;
            if page.is_some() { highlight.page = page; }
            let engine = OcrSearchEngine::new(index_dir, Box::new(PlainTextFormat::default()))?;
            let results = engine.search(&query_text, limit, &highlight)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        _ => { eprintln!("Unknown command: {}", cmd); std::process::exit(1); }
    }
    Ok(())
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use bookbrief::{
    logging,
    processing::{ChunkOptions, assess_extraction, chunk},
    summary::validate,
};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "bookbrief-cli",
    about = "Offline helpers for chunking, counting, and validating summaries"
)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a text file into overlapping windows and print them as JSON.
    Chunk {
        path: PathBuf,
        #[arg(long, default_value_t = bookbrief::processing::chunking::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        #[arg(long, default_value_t = bookbrief::processing::chunking::DEFAULT_CHUNK_OVERLAP)]
        overlap: usize,
        #[arg(long)]
        max_chunks: Option<usize>,
    },
    /// Count words in a file, or in every `.txt`/`.md` file under a directory.
    WordCount { path: PathBuf },
    /// Run the summary validation cascade over a JSON file.
    Validate { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_tracing(cli.verbose);

    let output = match cli.command {
        Command::Chunk {
            path,
            chunk_size,
            overlap,
            max_chunks,
        } => {
            let text = read_text(&path)?;
            let chunks = chunk(
                &text,
                ChunkOptions {
                    chunk_size,
                    overlap,
                    max_chunks,
                },
            );
            json!({ "chunk_count": chunks.len(), "chunks": chunks })
        }
        Command::WordCount { path } => word_counts(&path)?,
        Command::Validate { path } => {
            let raw = read_text(&path)?;
            let payload: Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            match validate(&payload) {
                Ok(summary) => serde_json::to_value(summary)?,
                Err(error) => bail!("{}: {error}", path.display()),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn word_counts(path: &Path) -> Result<Value> {
    if path.is_file() {
        return file_report(path);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }

    let mut files = Vec::new();
    let mut total = 0u64;
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        if !entry.file_type().is_file() || !is_text_file(entry.path()) {
            continue;
        }
        let report = file_report(entry.path())?;
        total += report["word_count"].as_u64().unwrap_or(0);
        files.push(report);
    }
    Ok(json!({ "total_words": total, "files": files }))
}

fn file_report(path: &Path) -> Result<Value> {
    let text = read_text(path)?;
    let byte_size = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    let name = path.file_name().and_then(|name| name.to_str());
    let report = assess_extraction(name, byte_size, &text);
    let mut value = serde_json::to_value(report)?;
    if let Value::Object(map) = &mut value {
        map.insert("path".into(), json!(path.display().to_string()));
    }
    Ok(value)
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "txt" | "md"))
}

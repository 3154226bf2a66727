// Note indexer driver
//
// Reads newline-delimited JSON notes from a file (first argument) or stdin,
// pushes them through the indexing pipeline into the configured search
// backend and prints the final metrics as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use note_indexer::{BackendConfig, IndexerConfig, NoteDocument, NoteIndexer, SearchBackendClient};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct IngestSummary {
    lines: usize,
    accepted: usize,
    malformed: usize,
}

async fn ingest<R>(indexer: &NoteIndexer, reader: R) -> Result<IngestSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = IngestSummary::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        summary.lines += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let note = match NoteDocument::from_json(line) {
            Ok(note) => note,
            Err(e) => {
                warn!(line = summary.lines, error = %e, "Skipping malformed note");
                summary.malformed += 1;
                continue;
            }
        };
        if indexer.submit(note, None) {
            summary.accepted += 1;
        }
    }
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let indexer_config = IndexerConfig::from_env().context("invalid indexer configuration")?;
    let backend_config = BackendConfig::from_env().context("invalid search backend configuration")?;

    let backend = Arc::new(
        SearchBackendClient::new(backend_config).context("failed to build search backend client")?,
    );
    let health = backend
        .initialize()
        .await
        .context("search backend is not available")?;
    info!(cluster = %health.cluster_name, status = health.status.as_str(), "Connected to search backend");

    let indexer = NoteIndexer::new(Arc::clone(&backend), indexer_config)?;
    indexer.start();

    let summary = match std::env::args().nth(1).filter(|arg| arg != "-") {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {path}"))?;
            ingest(&indexer, BufReader::new(file)).await?
        }
        None => ingest(&indexer, BufReader::new(tokio::io::stdin())).await?,
    };
    info!(
        lines = summary.lines,
        accepted = summary.accepted,
        malformed = summary.malformed,
        "Input consumed"
    );

    let flushed = indexer.flush_queue().await;
    indexer.stop().await;
    backend.shutdown().await;
    info!(flushed, "Indexing finished");

    let report = json!({
        "input": {
            "lines": summary.lines,
            "accepted": summary.accepted,
            "malformed": summary.malformed,
        },
        "indexing": indexer.metrics(),
        "backend": backend.metrics(),
        "failed_operations": indexer.failed_operations(20),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

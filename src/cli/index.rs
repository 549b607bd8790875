//! CLI `index` command: load the events spreadsheet into the vector index.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::{Arc, Mutex};

use concierge::config::ConciergeConfig;
use concierge::db;
use concierge::embedding::{self, EmbeddingProvider};
use concierge::events::{index, loader, EventRetriever};

const BATCH_SIZE: usize = 32;
const SMOKE_QUERY: &str = "art workshop";

pub async fn index(config: &ConciergeConfig, csv_path: &Path) -> Result<()> {
    let loaded = loader::load_events_csv(csv_path)?;
    for (row, reason) in &loaded.skipped {
        println!("  skipped {row}: {reason}");
    }

    let total = loaded.records.len();
    if total == 0 {
        println!("No usable events in {}.", csv_path.display());
        return Ok(());
    }

    let db_path = config.resolved_db_path();
    let mut conn = db::open_database(&db_path).context("failed to open database")?;

    let provider: Arc<dyn EmbeddingProvider> = Arc::from(
        embedding::create_provider(&config.embedding)
            .context("failed to create embedding provider")?,
    );

    println!("Indexing {total} events with model '{}'...", config.embedding.model);
    let pb = ProgressBar::new(total as u64);
    pb.set_style(super::progress_style("  {bar:40.cyan/blue} {pos}/{len} ({eta})")?);

    for chunk in loaded.records.chunks(BATCH_SIZE) {
        let texts: Vec<String> = chunk.iter().map(|e| e.embedding_text()).collect();
        let batch_provider = Arc::clone(&provider);
        let embeddings = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            batch_provider.embed_batch(&refs)
        })
        .await?
        .context("embedding batch failed")?;

        for (event, vector) in chunk.iter().zip(&embeddings) {
            index::upsert_event(&mut conn, event, vector)
                .with_context(|| format!("failed to store event {}", event.id))?;
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    db::migrations::set_embedding_model(&conn, &config.embedding.model)?;
    println!(
        "Indexed {total} events ({} skipped). Index now holds {}.",
        loaded.skipped.len(),
        index::count_events(&conn)?
    );

    let retriever = EventRetriever::new(Arc::new(Mutex::new(conn)), provider);
    let hits = retriever.search(SMOKE_QUERY, 3).await?;
    tracing::info!(query = SMOKE_QUERY, hits = hits.len(), "smoke search after indexing");
    if let Some(top) = hits.first() {
        println!("Smoke search '{SMOKE_QUERY}': top hit '{}' ({:.4})", top.event.name, top.distance);
    }

    Ok(())
}

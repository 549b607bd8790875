//! Event records and the vector index built over them.
//!
//! [`loader`] turns a spreadsheet export into [`EventRecord`]s, [`index`] writes
//! them with their embeddings, [`search`] runs KNN queries and formats results.
//! [`EventRetriever`] ties the embedding provider and database together for the
//! async callers (HTTP handlers and the daily digest).

pub mod index;
pub mod loader;
pub mod search;
pub mod types;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::embedding::EmbeddingProvider;
pub use types::{EventHit, EventRecord};

/// Encode an f32 vector as the little-endian blob sqlite-vec expects.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Embeds a query and searches the index, off the async runtime.
#[derive(Clone)]
pub struct EventRetriever {
    db: Arc<Mutex<Connection>>,
    embedding: Arc<dyn EmbeddingProvider>,
}

impl EventRetriever {
    pub fn new(db: Arc<Mutex<Connection>>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, embedding }
    }

    /// Nearest events to `query`, closest first.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<EventHit>> {
        let provider = Arc::clone(&self.embedding);
        let text = query.to_string();
        let query_embedding = tokio::task::spawn_blocking(move || provider.embed(&text)).await??;

        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            search::nearest_events(&conn, &query_embedding, limit)
        })
        .await?
    }

    /// Context block for a chat prompt. Never fails: retrieval errors are logged
    /// and replaced by a placeholder so the answer can still be generated.
    pub async fn context_for(&self, prompt: &str, limit: usize) -> String {
        match self.search(prompt, limit).await {
            Ok(hits) => {
                tracing::debug!(hits = hits.len(), "retrieved event context");
                search::format_context(&hits)
            }
            Err(e) => {
                tracing::error!(error = %e, "event context retrieval failed");
                search::CONTEXT_UNAVAILABLE.to_string()
            }
        }
    }

    /// Digest of events scheduled on `today`. Retrieval errors become the message body.
    pub async fn digest_for(&self, today: NaiveDate, limit: usize) -> String {
        match self.search(&search::digest_query(today), limit).await {
            Ok(hits) => search::format_digest(&hits, today),
            Err(e) => {
                tracing::error!(error = %e, "failed to retrieve today's events");
                format!("Error retrieving events: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_little_endian_f32() {
        let bytes = embedding_to_bytes(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-2.5f32).to_le_bytes());
    }
}

//! Session store: per-session chat transcripts with bounded retention.
//!
//! A session is an ordered, append-only list of [`Message`]s keyed by an opaque
//! id. Each append pushes the expiry forward by the configured TTL; once a
//! session expires it reads as empty and the next append starts over.
//!
//! [`ConversationStore`] is the async handle shared with request handlers. Its
//! fallible methods return errors; [`ConversationStore::history_or_empty`] and
//! [`ConversationStore::record_exchange`] are the request-path variants that log
//! storage failures instead of surfacing them.

pub mod store;
pub mod types;

use anyhow::Result;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use types::{Message, Role};

#[derive(Clone)]
pub struct ConversationStore {
    db: Arc<Mutex<Connection>>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(db: Arc<Mutex<Connection>>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn)
        })
        .await?
    }

    /// Append one entry, creating the session if absent and resetting its expiry.
    pub async fn append(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        let (id, text, ttl) = (session_id.to_string(), content.to_string(), self.ttl);
        self.with_conn(move |conn| {
            store::append_message(conn, &id, role, &text, ttl, chrono::Utc::now())
        })
        .await
    }

    /// Full transcript, oldest first. Absent or expired sessions read as empty.
    pub async fn read(&self, session_id: &str) -> Result<Vec<Message>> {
        let id = session_id.to_string();
        self.with_conn(move |conn| store::read_transcript(conn, &id, chrono::Utc::now()))
            .await
    }

    /// Set or refresh a session's time-to-live. Returns `false` if no live session exists.
    pub async fn expire(&self, session_id: &str, ttl: Duration) -> Result<bool> {
        let id = session_id.to_string();
        self.with_conn(move |conn| store::set_expiry(conn, &id, ttl, chrono::Utc::now()))
            .await
    }

    /// Remove all expired sessions now. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.with_conn(|conn| store::purge_expired(conn, chrono::Utc::now()))
            .await
    }

    /// Transcript for the request path: storage failures degrade to an empty history.
    pub async fn history_or_empty(&self, session_id: &str) -> Vec<Message> {
        match self.read(session_id).await {
            Ok(history) => {
                tracing::info!(session_id, messages = history.len(), "retrieved conversation history");
                history
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "failed to retrieve conversation history");
                vec![]
            }
        }
    }

    /// Persist a completed user/assistant exchange. Failures are logged, never returned,
    /// so an answer that was already generated still reaches the caller.
    pub async fn record_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let (id, user, assistant, ttl) = (
            session_id.to_string(),
            user.to_string(),
            assistant.to_string(),
            self.ttl,
        );
        let result = self
            .with_conn(move |conn| {
                store::append_exchange(conn, &id, &user, &assistant, ttl, chrono::Utc::now())
            })
            .await;

        match result {
            Ok(()) => tracing::info!(session_id, "stored conversation turn"),
            Err(e) => tracing::error!(session_id, error = %e, "failed to store conversation turn"),
        }
    }
}

/// Periodically purge expired sessions until the task is aborted.
pub fn spawn_sweeper(store: ConversationStore, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => tracing::debug!("session sweep: nothing expired"),
                Ok(removed) => tracing::info!(removed, "session sweep removed expired sessions"),
                Err(e) => tracing::warn!(error = %e, "session sweep failed"),
            }
        }
    })
}

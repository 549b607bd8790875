//! Daily event digest delivered over SMS.
//!
//! [`run_daily_digest`] is a one-shot job: look up today's events, format them,
//! send one message. Scheduling is left to the host (cron, systemd timer).

pub mod twilio;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::events::EventRetriever;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("messaging request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("messaging service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected messaging response: {0}")]
    Malformed(String),
}

/// Outbound text-message delivery.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send `body` to `to`. Returns the provider's message id.
    async fn send(&self, to: &str, body: &str) -> Result<String, NotifyError>;
}

/// Prefix every digest message carries.
pub const DIGEST_HEADER: &str = "Today's Events:";

/// Compose the digest text for `today`.
pub async fn compose_digest(retriever: &EventRetriever, today: NaiveDate, limit: usize) -> String {
    let summary = retriever.digest_for(today, limit).await;
    format!("{DIGEST_HEADER}\n\n{summary}")
}

/// Compose and send today's digest. Returns the provider's message id.
pub async fn run_daily_digest(
    retriever: &EventRetriever,
    gateway: &dyn MessagingGateway,
    to: &str,
    today: NaiveDate,
    limit: usize,
) -> Result<String, NotifyError> {
    let body = compose_digest(retriever, today, limit).await;
    let sid = gateway.send(to, &body).await?;
    tracing::info!(%sid, %today, "daily digest sent");
    Ok(sid)
}

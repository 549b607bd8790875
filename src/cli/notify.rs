//! CLI `notify` command: text today's event digest.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};

use concierge::config::ConciergeConfig;
use concierge::events::EventRetriever;
use concierge::notify::{self, twilio::TwilioClient};

pub async fn notify(config: &ConciergeConfig, dry_run: bool) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let limit = config.retrieval.digest_results;

    let conn = concierge::db::open_database(config.resolved_db_path())?;
    let provider = concierge::embedding::create_provider(&config.embedding)?;
    let retriever = EventRetriever::new(Arc::new(Mutex::new(conn)), Arc::from(provider));

    if dry_run {
        println!("{}", notify::compose_digest(&retriever, today, limit).await);
        return Ok(());
    }

    let settings = config.notify.settings()?;
    let gateway = TwilioClient::new(&settings)?;
    let sid = notify::run_daily_digest(&retriever, &gateway, &settings.to_number, today, limit)
        .await
        .context("failed to send daily digest")?;

    println!("Digest sent (message {sid}).");
    Ok(())
}

use anyhow::Result;
use std::sync::{Arc, Mutex};

use concierge::config::ConciergeConfig;
use concierge::events::EventRetriever;

/// Run an event search from the terminal.
pub async fn search(config: &ConciergeConfig, query: &str, limit: usize) -> Result<()> {
    let conn = concierge::db::open_database(config.resolved_db_path())?;
    let provider = concierge::embedding::create_provider(&config.embedding)?;
    let retriever = EventRetriever::new(Arc::new(Mutex::new(conn)), Arc::from(provider));

    let hits = retriever.search(query, limit).await?;
    if hits.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    println!("Found {} event(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let event = &hit.event;
        println!(
            "  {}. {} [{}] (distance: {:.4})",
            i + 1,
            event.name,
            event.id,
            hit.distance
        );
        println!("     {} {} at {}", event.date, event.start_time, event.location);
        if !event.description.is_empty() {
            let preview: String = event.description.chars().take(120).collect();
            let ellipsis = if event.description.chars().count() > 120 { "..." } else { "" };
            println!("     {preview}{ellipsis}");
        }
        println!();
    }

    Ok(())
}

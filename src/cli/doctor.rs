//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use concierge::config::ConciergeConfig;
use concierge::db;

pub fn doctor(config: &ConciergeConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `concierge index <events.csv>` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Concierge Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!(
        "  Stored:          {}",
        report.embedding_model.as_deref().unwrap_or("(not set)")
    );
    println!("  Configured:      {}", config.embedding.model);
    match report.embedding_model.as_deref() {
        Some(stored) if stored != config.embedding.model => {
            println!("  WARNING: model mismatch! Re-run `concierge index` to rebuild vectors.");
        }
        Some(_) => println!("  Status:          OK (match)"),
        None => {}
    }
    println!();
    println!("Row counts:");
    println!("  Events:          {}", report.event_count);
    println!("  Event vectors:   {}", report.vector_count);
    if report.event_count != report.vector_count {
        println!("  WARNING: events and vectors are out of sync.");
    }
    println!("  Sessions:        {}", report.session_count);
    println!("  Messages:        {}", report.message_count);
    println!();
    println!("Inference token:   {}", status(config.inference.require_token().is_ok()));
    println!("SMS settings:      {}", status(config.notify.settings().is_ok()));
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery: delete {} and re-run `concierge index`.", db_path.display());
        println!("Conversation history will be lost.");
    }

    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok {
        "configured"
    } else {
        "missing"
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

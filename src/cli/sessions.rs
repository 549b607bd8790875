use anyhow::Result;

use concierge::config::ConciergeConfig;
use concierge::conversation::store;

/// Delete expired conversations now instead of waiting for the server's sweep.
pub fn purge(config: &ConciergeConfig) -> Result<()> {
    let mut conn = concierge::db::open_database(config.resolved_db_path())?;
    let removed = store::purge_expired(&mut conn, chrono::Utc::now())?;
    println!("Removed {removed} expired session(s).");
    Ok(())
}

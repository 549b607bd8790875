//! KNN retrieval over the events index, plus the text blocks built from results.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};

use super::embedding_to_bytes;
use super::index::{event_from_row, EVENT_COLUMNS};
use super::types::EventHit;

/// Shown to the model when nothing in the index is close to the prompt.
pub const NO_CONTEXT: &str = "No relevant events found.";
/// Shown to the model when the index could not be queried.
pub const CONTEXT_UNAVAILABLE: &str = "Error retrieving event information.";
/// Digest body when no event falls on the requested day.
pub const NO_EVENTS_TODAY: &str = "No events scheduled for today.";

/// Return up to `limit` events nearest to `embedding`, closest first.
pub fn nearest_events(conn: &Connection, embedding: &[f32], limit: usize) -> Result<Vec<EventHit>> {
    if limit == 0 {
        return Ok(vec![]);
    }

    let mut knn = conn.prepare(
        "SELECT id, distance FROM events_vec \
         WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
    )?;
    let neighbours: Vec<(String, f64)> = knn
        .query_map(params![embedding_to_bytes(embedding), limit as i64], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut fetch = conn.prepare(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"))?;
    let mut hits = Vec::with_capacity(neighbours.len());
    for (id, distance) in neighbours {
        // A vector without its row means a half-written upsert; skip it.
        match fetch.query_row(params![id], event_from_row) {
            Ok(event) => hits.push(EventHit { event, distance }),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                tracing::warn!(event_id = %id, "vector has no matching event row");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(hits)
}

/// Format hits as the context block embedded in chat prompts.
pub fn format_context(hits: &[EventHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }
    hits.iter()
        .map(|hit| {
            format!(
                "Event: {}\nDate: {}\nDescription: {}",
                hit.event.name, hit.event.date, hit.event.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format the SMS digest body from hits, keeping only events dated `today`.
pub fn format_digest(hits: &[EventHit], today: NaiveDate) -> String {
    let today = today.format("%Y-%m-%d").to_string();
    let blocks: Vec<String> = hits
        .iter()
        .filter(|hit| hit.event.date == today)
        .map(|hit| format!("Event: {}\nDescription: {}", hit.event.name, hit.event.description))
        .collect();
    if blocks.is_empty() {
        NO_EVENTS_TODAY.to_string()
    } else {
        blocks.join("\n\n")
    }
}

/// Query text used to pull candidate events for a day's digest.
pub fn digest_query(today: NaiveDate) -> String {
    format!("Events happening on {}", today.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventRecord;

    fn hit(name: &str, date: &str) -> EventHit {
        EventHit {
            event: EventRecord {
                id: name.to_lowercase(),
                name: name.into(),
                description: format!("{name} description"),
                date: date.into(),
                start_time: "10:00:00".into(),
                end_time: None,
                location: String::new(),
                organizer: String::new(),
                resident_participants: String::new(),
                created_at: None,
                updated_at: None,
            },
            distance: 0.1,
        }
    }

    #[test]
    fn context_lists_events_in_order() {
        let text = format_context(&[hit("Yoga", "2024-05-01"), hit("Bingo", "2024-05-02")]);
        assert_eq!(
            text,
            "Event: Yoga\nDate: 2024-05-01\nDescription: Yoga description\n\n\
             Event: Bingo\nDate: 2024-05-02\nDescription: Bingo description"
        );
    }

    #[test]
    fn empty_context_has_placeholder() {
        assert_eq!(format_context(&[]), NO_CONTEXT);
    }

    #[test]
    fn digest_keeps_only_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let text = format_digest(&[hit("Yoga", "2024-05-01"), hit("Bingo", "2024-05-02")], today);
        assert_eq!(text, "Event: Yoga\nDescription: Yoga description");
    }

    #[test]
    fn digest_without_matches() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        assert_eq!(format_digest(&[hit("Yoga", "2024-05-01")], today), NO_EVENTS_TODAY);
    }

    #[test]
    fn digest_query_names_the_day() {
        let today = NaiveDate::from_ymd_opt(2024, 12, 24).unwrap();
        assert_eq!(digest_query(today), "Events happening on 2024-12-24");
    }
}

//! Write path for the events index.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::embedding_to_bytes;
use super::types::EventRecord;
use crate::embedding::EMBEDDING_DIM;

/// Insert or replace an event and its vector in one transaction.
///
/// vec0 tables do not support `UPDATE` of the vector column, so the old vector
/// row is deleted and re-inserted.
pub fn upsert_event(conn: &mut Connection, event: &EventRecord, embedding: &[f32]) -> Result<()> {
    anyhow::ensure!(
        embedding.len() == EMBEDDING_DIM,
        "embedding for event {} has {} dimensions, expected {EMBEDDING_DIM}",
        event.id,
        embedding.len()
    );

    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO events (id, name, description, date, start_time, end_time, location, \
         organizer, resident_participants, created_at, updated_at, indexed_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
         ON CONFLICT(id) DO UPDATE SET \
         name = excluded.name, description = excluded.description, date = excluded.date, \
         start_time = excluded.start_time, end_time = excluded.end_time, \
         location = excluded.location, organizer = excluded.organizer, \
         resident_participants = excluded.resident_participants, \
         created_at = excluded.created_at, updated_at = excluded.updated_at, \
         indexed_at = excluded.indexed_at",
        params![
            event.id,
            event.name,
            event.description,
            event.date,
            event.start_time,
            event.end_time,
            event.location,
            event.organizer,
            event.resident_participants,
            event.created_at,
            event.updated_at,
            now,
        ],
    )?;

    tx.execute("DELETE FROM events_vec WHERE id = ?1", params![event.id])?;
    tx.execute(
        "INSERT INTO events_vec (id, embedding) VALUES (?1, ?2)",
        params![event.id, embedding_to_bytes(embedding)],
    )?;

    tx.commit()?;
    Ok(())
}

/// Fetch one event by id.
pub fn get_event(conn: &Connection, id: &str) -> Result<Option<EventRecord>> {
    let event = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            params![id],
            event_from_row,
        )
        .optional()?;
    Ok(event)
}

/// Number of indexed events.
pub fn count_events(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?)
}

pub(crate) const EVENT_COLUMNS: &str = "id, name, description, date, start_time, end_time, \
     location, organizer, resident_participants, created_at, updated_at";

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        date: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        location: row.get(6)?,
        organizer: row.get(7)?,
        resident_participants: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

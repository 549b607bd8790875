//! SQL operations behind the session store.
//!
//! Every function takes `now` explicitly so expiry is decided by the caller's
//! clock. Expiry is lazy: an expired session reads as empty and is discarded
//! before the next append. [`purge_expired`] removes the leftovers in bulk.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;

use super::types::{Message, Role};

fn expiry_millis(now: DateTime<Utc>, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.timestamp_millis().saturating_add(ttl_ms)
}

/// `Some(expires_at)` for a session that exists and has not expired.
fn live_expiry(conn: &Connection, session_id: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
    let expires_at: Option<i64> = conn
        .query_row(
            "SELECT expires_at FROM conversations WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(expires_at.filter(|&at| at > now.timestamp_millis()))
}

fn discard_session(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM conversation_messages WHERE session_id = ?1",
        params![session_id],
    )?;
    conn.execute(
        "DELETE FROM conversations WHERE session_id = ?1",
        params![session_id],
    )?;
    Ok(())
}

/// Start a fresh transcript if the session expired, then push its expiry to `now + ttl`.
fn renew_session(
    conn: &Connection,
    session_id: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    if live_expiry(conn, session_id, now)?.is_none() {
        discard_session(conn, session_id)?;
    }
    conn.execute(
        "INSERT INTO conversations (session_id, expires_at) VALUES (?1, ?2) \
         ON CONFLICT(session_id) DO UPDATE SET expires_at = excluded.expires_at",
        params![session_id, expiry_millis(now, ttl)],
    )?;
    Ok(())
}

fn insert_message(
    conn: &Connection,
    session_id: &str,
    role: Role,
    content: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO conversation_messages (session_id, role, content, created_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![session_id, role.as_str(), content, now.to_rfc3339()],
    )?;
    Ok(())
}

/// Append one message, creating the session if needed and resetting its expiry.
///
/// If the previous session under this key has expired, it is discarded first so
/// the new message starts a fresh transcript.
pub fn append_message(
    conn: &mut Connection,
    session_id: &str,
    role: Role,
    content: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let tx = conn.transaction()?;
    renew_session(&tx, session_id, ttl, now)?;
    insert_message(&tx, session_id, role, content, now)?;
    tx.commit()?;
    Ok(())
}

/// Append a user message and the assistant reply together. Either both are
/// stored or neither is.
pub fn append_exchange(
    conn: &mut Connection,
    session_id: &str,
    user: &str,
    assistant: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let tx = conn.transaction()?;
    renew_session(&tx, session_id, ttl, now)?;
    insert_message(&tx, session_id, Role::User, user, now)?;
    insert_message(&tx, session_id, Role::Assistant, assistant, now)?;
    tx.commit()?;
    Ok(())
}

/// Full transcript in insertion order. Absent or expired sessions read as empty.
pub fn read_transcript(
    conn: &Connection,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Message>> {
    if live_expiry(conn, session_id, now)?.is_none() {
        return Ok(vec![]);
    }

    let mut stmt = conn.prepare(
        "SELECT role, content FROM conversation_messages WHERE session_id = ?1 ORDER BY seq",
    )?;
    let rows = stmt
        .query_map(params![session_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(role, content)| -> Result<Message> {
            let role = role.parse::<Role>().map_err(anyhow::Error::msg)?;
            Ok(Message { role, content })
        })
        .collect()
}

/// Set a live session's time-to-live, counted from `now`.
///
/// Returns `false` when there is no live session under `session_id`.
pub fn set_expiry(
    conn: &Connection,
    session_id: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<bool> {
    if live_expiry(conn, session_id, now)?.is_none() {
        return Ok(false);
    }
    conn.execute(
        "UPDATE conversations SET expires_at = ?1 WHERE session_id = ?2",
        params![expiry_millis(now, ttl), session_id],
    )?;
    Ok(true)
}

/// Delete every expired session and its messages. Returns the number of sessions removed.
pub fn purge_expired(conn: &mut Connection, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = now.timestamp_millis();
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM conversation_messages WHERE session_id IN \
         (SELECT session_id FROM conversations WHERE expires_at <= ?1)",
        params![cutoff],
    )?;
    let removed = tx.execute(
        "DELETE FROM conversations WHERE expires_at <= ?1",
        params![cutoff],
    )?;
    tx.commit()?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let mut conn = crate::db::open_in_memory().unwrap();
        append_message(&mut conn, "s", Role::User, "hi", Duration::from_secs(10), t0()).unwrap();

        let just_before = t0() + chrono::Duration::milliseconds(9_999);
        let at_expiry = t0() + chrono::Duration::seconds(10);
        assert_eq!(read_transcript(&conn, "s", just_before).unwrap().len(), 1);
        assert!(read_transcript(&conn, "s", at_expiry).unwrap().is_empty());
    }

    #[test]
    fn append_after_expiry_starts_fresh() {
        let mut conn = crate::db::open_in_memory().unwrap();
        append_message(&mut conn, "s", Role::User, "old", DAY, t0()).unwrap();

        let later = t0() + chrono::Duration::days(2);
        append_message(&mut conn, "s", Role::User, "new", DAY, later).unwrap();

        let transcript = read_transcript(&conn, "s", later).unwrap();
        assert_eq!(transcript, vec![Message::user("new")]);
    }

    #[test]
    fn exchange_is_all_or_nothing() {
        let mut conn = crate::db::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_assistant BEFORE INSERT ON conversation_messages \
             WHEN NEW.role = 'assistant' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        assert!(append_exchange(&mut conn, "s", "hello", "hi", DAY, t0()).is_err());
        let stored: i64 = conn
            .query_row("SELECT COUNT(*) FROM conversation_messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, 0);
        assert!(read_transcript(&conn, "s", t0()).unwrap().is_empty());

        conn.execute_batch("DROP TRIGGER reject_assistant;").unwrap();
        append_exchange(&mut conn, "s", "hello", "hi", DAY, t0()).unwrap();
        assert_eq!(
            read_transcript(&conn, "s", t0()).unwrap(),
            vec![Message::user("hello"), Message::assistant("hi")]
        );
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        assert_eq!(expiry_millis(t0(), Duration::MAX), i64::MAX);
    }
}

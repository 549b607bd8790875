//! Event record types.

use serde::Serialize;

/// A community event as stored in the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// `EVENT_ID` from the spreadsheet, or a slug of the name.
    pub id: String,
    pub name: String,
    pub description: String,
    /// `YYYY-MM-DD` when the source value parsed as a date; verbatim otherwise.
    pub date: String,
    /// `HH:MM:SS` when the source value parsed as a time; verbatim otherwise.
    pub start_time: String,
    pub end_time: Option<String>,
    pub location: String,
    pub organizer: String,
    pub resident_participants: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl EventRecord {
    /// Text fed to the embedding model. Timestamps beyond date/time are left out.
    pub fn embedding_text(&self) -> String {
        let mut text = format!(
            "{} - {} on {} at {} from {}",
            self.name, self.description, self.date, self.location, self.start_time
        );
        if let Some(end) = &self.end_time {
            text.push_str(" to ");
            text.push_str(end);
        }
        text
    }
}

/// Derive an id from an event name: lowercased, spaces replaced by underscores.
pub fn slug_id(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// A KNN search result.
#[derive(Debug, Clone, Serialize)]
pub struct EventHit {
    pub event: EventRecord,
    /// L2 distance between unit vectors; smaller is closer.
    pub distance: f64,
}

//! Spreadsheet (CSV export) parsing for the events index.
//!
//! Column names follow the events workbook: `EVENT_NAME`, `EVENT_DATE`,
//! `START_TIME`, and so on. Dates and times are normalized where they parse and
//! kept verbatim where they don't.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::path::Path;

use super::types::{slug_id, EventRecord};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M:%S %p", "%I:%M%p"];

/// One raw spreadsheet row.
#[derive(Debug, Deserialize)]
pub struct EventRow {
    #[serde(rename = "EVENT_ID", default)]
    pub event_id: Option<String>,
    #[serde(rename = "EVENT_NAME", default)]
    pub name: String,
    #[serde(rename = "EVENT_DESCRIPTION", default)]
    pub description: String,
    #[serde(rename = "EVENT_DATE", default)]
    pub date: String,
    #[serde(rename = "START_TIME", default)]
    pub start_time: String,
    #[serde(rename = "END_TIME", default)]
    pub end_time: String,
    #[serde(rename = "LOCATION", default)]
    pub location: String,
    #[serde(rename = "ORGANIZER", default)]
    pub organizer: String,
    #[serde(rename = "RESIDENT_PARTICIPATION", default)]
    pub resident_participation: Option<String>,
    #[serde(rename = "CREATED_AT", default)]
    pub created_at: Option<String>,
    #[serde(rename = "UPDATED_AT", default)]
    pub updated_at: Option<String>,
}

/// Why a row was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingName,
    InvalidDate,
    InvalidStartTime,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MissingName => "missing event name",
            Self::InvalidDate => "invalid date",
            Self::InvalidStartTime => "invalid start time",
        })
    }
}

/// Outcome of reading a spreadsheet: usable records plus skipped rows.
#[derive(Debug, Default)]
pub struct LoadedEvents {
    pub records: Vec<EventRecord>,
    /// `(name or row number, reason)` for each skipped row.
    pub skipped: Vec<(String, SkipReason)>,
}

impl EventRow {
    pub fn into_record(self) -> Result<EventRecord, SkipReason> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(SkipReason::MissingName);
        }
        let date = clean_date(&self.date).ok_or(SkipReason::InvalidDate)?;
        let start_time = clean_time(&self.start_time).ok_or(SkipReason::InvalidStartTime)?;

        let id = non_empty(self.event_id).unwrap_or_else(|| slug_id(&name));

        Ok(EventRecord {
            id,
            description: self.description.trim().to_string(),
            date,
            start_time,
            end_time: clean_time(&self.end_time),
            location: self.location.trim().to_string(),
            organizer: self.organizer.trim().to_string(),
            resident_participants: non_empty(self.resident_participation).unwrap_or_default(),
            created_at: non_empty(self.created_at).and_then(|v| clean_date(&v)),
            updated_at: non_empty(self.updated_at).and_then(|v| clean_date(&v)),
            name,
        })
    }
}

/// Read every row of a CSV file, separating usable records from skipped rows.
pub fn load_events_csv(path: &Path) -> Result<LoadedEvents> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open events file: {}", path.display()))?;

    let mut loaded = LoadedEvents::default();
    for (index, row) in reader.deserialize::<EventRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = row.with_context(|| format!("failed to parse row at line {line}"))?;
        let label = if row.name.trim().is_empty() {
            format!("line {line}")
        } else {
            row.name.trim().to_string()
        };
        match row.into_record() {
            Ok(record) => loaded.records.push(record),
            Err(reason) => {
                tracing::warn!(event = %label, %reason, "skipping event row");
                loaded.skipped.push((label, reason));
            }
        }
    }

    Ok(loaded)
}

/// Normalize a spreadsheet date cell to `YYYY-MM-DD`.
///
/// Returns `None` for empty cells; unrecognized non-empty values are returned as-is.
pub fn clean_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_datetime(raw).map(|dt| dt.date()));
    Some(match parsed {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => raw.to_string(),
    })
}

/// Normalize a spreadsheet time cell to `HH:MM:SS`.
///
/// Full timestamps contribute their time part. Returns `None` for empty cells;
/// unrecognized non-empty values are returned as-is.
pub fn clean_time(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_datetime(raw).map(|dt| dt.time()));
    Some(match parsed {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => raw.to_string(),
    })
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

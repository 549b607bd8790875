use concierge::events::loader::{load_events_csv, SkipReason};
use std::io::Write;
use tempfile::NamedTempFile;

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const HEADER: &str = "EVENT_ID,EVENT_NAME,EVENT_DESCRIPTION,EVENT_DATE,START_TIME,END_TIME,\
LOCATION,ORGANIZER,RESIDENT_PARTICIPATION,CREATED_AT,UPDATED_AT\n";

#[test]
fn loads_and_normalizes_rows() {
    let file = csv_file(&format!(
        "{HEADER}\
         E1,Art Workshop,Watercolor basics,2024-06-03 00:00:00,2:30 PM,16:00,Studio,Arts Club,12,2024-05-01,\n\
         ,Morning Yoga,Gentle stretching,06/04/2024,09:00,,Garden,Wellness Team,,,\n"
    ));

    let loaded = load_events_csv(file.path()).unwrap();
    assert!(loaded.skipped.is_empty());
    assert_eq!(loaded.records.len(), 2);

    let art = &loaded.records[0];
    assert_eq!(art.id, "E1");
    assert_eq!(art.date, "2024-06-03");
    assert_eq!(art.start_time, "14:30:00");
    assert_eq!(art.end_time.as_deref(), Some("16:00:00"));
    assert_eq!(art.resident_participants, "12");
    assert_eq!(art.created_at.as_deref(), Some("2024-05-01"));
    assert_eq!(art.updated_at, None);
    assert_eq!(
        art.embedding_text(),
        "Art Workshop - Watercolor basics on 2024-06-03 at Studio from 14:30:00 to 16:00:00"
    );

    let yoga = &loaded.records[1];
    assert_eq!(yoga.id, "morning_yoga");
    assert_eq!(yoga.date, "2024-06-04");
    assert_eq!(yoga.end_time, None);
}

#[test]
fn rows_missing_required_values_are_skipped() {
    let file = csv_file(&format!(
        "{HEADER}\
         ,,No name,2024-06-03,10:00,,Hall,Team,,,\n\
         ,Bingo,No date,,10:00,,Hall,Team,,,\n\
         ,Chess,No start,2024-06-03,,,Hall,Team,,,\n\
         ,Movie,Fine,2024-06-03,19:00,,Hall,Team,,,\n"
    ));

    let loaded = load_events_csv(file.path()).unwrap();
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].name, "Movie");

    let reasons: Vec<&SkipReason> = loaded.skipped.iter().map(|(_, r)| r).collect();
    assert!(matches!(reasons[..], [
        SkipReason::MissingName,
        SkipReason::InvalidDate,
        SkipReason::InvalidStartTime
    ]));
    assert_eq!(loaded.skipped[0].0, "line 2");
    assert_eq!(loaded.skipped[1].0, "Bingo");
}

#[test]
fn unparseable_values_are_kept_verbatim() {
    let file = csv_file(&format!(
        "{HEADER},Garden Party,Bring a hat,first Sunday,after lunch,,Lawn,Social,,,\n"
    ));

    let loaded = load_events_csv(file.path()).unwrap();
    assert_eq!(loaded.records[0].date, "first Sunday");
    assert_eq!(loaded.records[0].start_time, "after lunch");
}

#[test]
fn missing_file_is_an_error() {
    let err = load_events_csv(std::path::Path::new("/nonexistent/events.csv")).unwrap_err();
    assert!(err.to_string().contains("failed to open events file"));
}

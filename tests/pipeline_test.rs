use anyhow::Result;
use chrono::NaiveDate;
use museum_events::builder::EventRecordBuilder;
use museum_events::config::{AppConfig, RegionConfig};
use museum_events::dates::DateNormalizer;
use museum_events::fingerprint::ChangeType;
use museum_events::pipeline::{Pipeline, VenueFilter};
use museum_events::storage::{load_store, JsonFileStorage, StoreOptions};
use museum_events::types::RawEvent;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn file_pipeline(path: &Path, today: NaiveDate) -> Pipeline {
    let storage = Arc::new(JsonFileStorage::new(path, StoreOptions::default()));
    Pipeline::new(storage, EventRecordBuilder::new(DateNormalizer::for_today(today)))
}

fn scraped(value: Value) -> RawEvent {
    serde_json::from_value(value).unwrap()
}

fn read_document(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_ingest_is_idempotent_on_disk() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("events_db.json");
    let pipeline = file_pipeline(&path, ymd(2024, 1, 15));
    let event = scraped(json!({
        "name": "A",
        "venue": "V",
        "dates": {"start": "2024-01-01", "end": "2024-02-01"},
        "links": [{"link": "https://v.example/a", "description": "Event Page"}],
    }));

    assert_eq!(pipeline.process_event(&event)?, ChangeType::Created);
    let first = fs::read_to_string(&path)?;
    assert_eq!(pipeline.process_event(&event)?, ChangeType::NoChange);
    assert_eq!(fs::read_to_string(&path)?, first);

    let doc = read_document(&path);
    let record = &doc["V"]["A-V"];
    assert_eq!(doc["V"].as_object().unwrap().len(), 1);
    assert_eq!(record["phase"], json!("current"));
    assert_eq!(record["dates"], json!({"start": "2024-01-01", "end": "2024-02-01"}));
    assert_eq!(record["links"][0]["description"], json!("Event Page"));
    assert_eq!(record["hash"].as_str().unwrap().len(), 64);
    // four-space indentation
    assert!(first.contains("\n    \"V\""));
    Ok(())
}

#[test]
fn test_text_dates_flow_through_to_the_store() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("events_db.json");
    let pipeline = file_pipeline(&path, ymd(2024, 3, 1));
    let events = vec![
        scraped(json!({
            "name": "Range",
            "venue": "SFMOMA",
            "dates_text": "January 5–March 10, 2024",
            "links": [{"link": "https://sfmoma.example/range", "description": "Event Page"}],
        })),
        scraped(json!({
            "name": "Forever",
            "venue": "SFMOMA",
            "dates_text": "Ongoing",
            "venue_kind": "museum",
            "links": [{"link": "https://sfmoma.example/forever", "description": "Event Page"}],
        })),
        scraped(json!({
            "name": "Upcoming",
            "venue": "Gallery X",
            "venue_kind": "gallery",
            "dates_text": "Opens April 10",
            "links": [{"link": "https://x.example/upcoming", "description": "Event Page"}],
        })),
        scraped(json!({
            "name": "No link",
            "venue": "Gallery X",
            "dates_text": "April 10",
        })),
    ];

    let result = pipeline.process_batch(&events, &VenueFilter::default())?;
    assert_eq!(result.created, 3);
    assert_eq!(result.errors.len(), 1);

    let doc = read_document(&path);
    let range = &doc["SFMOMA"]["Range-SFMOMA"];
    assert_eq!(range["dates"], json!({"start": "2024-01-05", "end": "2024-03-10"}));
    assert_eq!(range["phase"], json!("current"));

    let forever = &doc["SFMOMA"]["Forever-SFMOMA"];
    assert_eq!(forever["ongoing"], json!(true));
    assert_eq!(forever["dates"]["end"], Value::Null);

    let upcoming = &doc["Gallery X"]["Upcoming-Gallery X"];
    assert_eq!(upcoming["dates"]["start"], json!("2024-04-10"));
    assert_eq!(upcoming["phase"], json!("future"));
    let tags: BTreeSet<&str> = upcoming["tags"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(tags.contains("gallery"));
    assert!(tags.contains("future"));
    Ok(())
}

#[test]
fn test_reconciliation_rewrites_stale_records_on_disk() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("events_db.json");
    fs::write(
        &path,
        serde_json::to_string(&json!({
            "V": {
                "A-V": {
                    "name": "A",
                    "venue": "V",
                    "phase": "current",
                    "ongoing": false,
                    "tags": ["exhibition", "current", "museum"],
                    "dates": {"start": "2024-01-01", "end": "2024-06-14"},
                    "hash": "abc",
                },
                "B-V": {
                    "name": "B",
                    "venue": "V",
                    "tags": ["exhibition"],
                    "dates": {"start": "2024-01-01", "end": "not a date"},
                    "hash": "def",
                },
            }
        }))?,
    )?;

    let pipeline = file_pipeline(&path, ymd(2024, 6, 15));
    let report = pipeline.run_phase_reconciliation()?;
    assert_eq!(report.examined, 2);
    assert_eq!(report.marked_past, 1);
    assert_eq!(report.errors.len(), 1);

    let doc = read_document(&path);
    let a = &doc["V"]["A-V"];
    assert_eq!(a["phase"], json!("past"));
    assert_eq!(a["ongoing"], json!(false));
    assert_eq!(a["hash"], json!("abc"));
    let tags: BTreeSet<&str> = a["tags"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(tags, ["exhibition", "museum", "past"].into_iter().collect());
    assert_eq!(doc["V"]["B-V"]["dates"]["end"], json!("not a date"));
    Ok(())
}

#[test]
fn test_malformed_store_reads_as_empty() -> Result<()> {
    let dir = tempdir()?;
    let options = StoreOptions::default();

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "{ not json")?;
    assert!(load_store(&garbage, &options).is_empty());

    let empty = dir.path().join("empty.json");
    fs::write(&empty, "")?;
    assert!(load_store(&empty, &options).is_empty());

    let missing = dir.path().join("missing").join("events_db.json");
    assert!(load_store(&missing, &options).is_empty());
    assert_eq!(fs::read_to_string(&missing)?, "{}");

    // a broken document is replaced by the next write, not merged
    let pipeline = file_pipeline(&garbage, ymd(2024, 1, 15));
    let event = RawEvent::new("A", "V")
        .with_dates(Some(ymd(2024, 1, 1)), Some(ymd(2024, 2, 1)))
        .with_link("https://v.example/a", "Event Page");
    assert_eq!(pipeline.process_event(&event)?, ChangeType::Created);
    assert_eq!(load_store(&garbage, &options).event_count(), 1);
    Ok(())
}

#[test]
fn test_dry_run_from_config_leaves_disk_untouched() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("docs").join("events_db.json");
    let mut config = AppConfig::default();
    config.dry_run = true;
    config
        .regions
        .insert("test".to_string(), RegionConfig { store_path: path.clone() });

    let pipeline = Pipeline::from_config(&config, "test", ymd(2024, 1, 15))?;
    let event = RawEvent::new("A", "V")
        .with_dates(Some(ymd(2024, 1, 1)), Some(ymd(2024, 2, 1)))
        .with_link("https://v.example/a", "Event Page");
    assert_eq!(pipeline.process_event(&event)?, ChangeType::Created);
    pipeline.run_phase_reconciliation()?;

    assert!(!path.exists());
    Ok(())
}

#[test]
fn test_nan_record_does_not_cost_other_venues() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("events_db.json");
    fs::write(
        &path,
        r#"{"SFMOMA": {
            "A-SFMOMA": {"name": "A", "venue": "SFMOMA", "description": NaN, "hash": "h"},
            "B-SFMOMA": {"name": "B", "venue": "SFMOMA", "hash": null}
        }}"#,
    )?;

    let pipeline = file_pipeline(&path, ymd(2024, 1, 15));
    let event = RawEvent::new("C", "BAMPFA")
        .with_dates(Some(ymd(2024, 1, 1)), Some(ymd(2024, 2, 1)))
        .with_link("https://bampfa.example/c", "Event Page");
    assert_eq!(pipeline.process_event(&event)?, ChangeType::Created);

    let store = load_store(&path, &StoreOptions::default());
    assert_eq!(store.venue_count(), 2);
    assert_eq!(store.event_count(), 3);
    let doc = read_document(&path);
    assert_eq!(doc["SFMOMA"]["A-SFMOMA"]["description"], Value::Null);
    assert_eq!(doc["SFMOMA"]["B-SFMOMA"]["hash"], json!(""));
    Ok(())
}

//! Store-wide phase correction.
//!
//! Phases are assigned when a record is written. If a run is skipped for a
//! while, exhibitions close without anyone noticing; this sweep re-derives
//! `past` from `dates.end` alone.

use crate::constants::{CURRENT_TAG, PAST_TAG, STORE_DATE_FORMAT};
use crate::storage::EventStore;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    /// Records moved to `past`.
    pub marked_past: usize,
    /// Records that lost a stale `past` tag.
    pub unmarked_past: usize,
    pub errors: Vec<String>,
}

impl ReconcileReport {
    pub fn changed(&self) -> usize {
        self.marked_past + self.unmarked_past
    }
}

/// Reads `dates.end`. Absent or null is `Ok(None)`.
fn end_date(fields: &Map<String, Value>) -> Result<Option<NaiveDate>, String> {
    let end = match fields.get("dates") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(dates)) => dates.get("end"),
        Some(other) => return Err(format!("dates is not an object: {}", other)),
    };
    match end {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, STORE_DATE_FORMAT)
            .map(Some)
            .map_err(|e| format!("bad end date '{}': {}", s, e)),
        Some(other) => Err(format!("end date is not a string: {}", other)),
    }
}

fn tags_mut(fields: &mut Map<String, Value>) -> Result<&mut Vec<Value>, String> {
    fields
        .entry("tags")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| "tags is not a list".to_string())
}

fn has_tag(tags: &[Value], tag: &str) -> bool {
    tags.iter().any(|t| t.as_str() == Some(tag))
}

/// Returns whether anything changed.
fn mark_past(fields: &mut Map<String, Value>) -> Result<bool, String> {
    let before = fields.clone();
    let tags = tags_mut(fields)?;
    tags.retain(|t| t.as_str() != Some(CURRENT_TAG));
    if !has_tag(tags, PAST_TAG) {
        tags.push(Value::String(PAST_TAG.to_string()));
    }
    fields.insert("phase".to_string(), Value::String(PAST_TAG.to_string()));
    fields.insert("ongoing".to_string(), Value::Bool(false));
    Ok(*fields != before)
}

/// Drops a `past` tag from a record that has not ended. `current`/`future`
/// are not recomputed.
fn unmark_past(fields: &mut Map<String, Value>) -> Result<bool, String> {
    let tags = match fields.get_mut("tags") {
        None | Some(Value::Null) => return Ok(false),
        Some(Value::Array(tags)) => tags,
        Some(_) => return Err("tags is not a list".to_string()),
    };
    let len = tags.len();
    tags.retain(|t| t.as_str() != Some(PAST_TAG));
    Ok(tags.len() != len)
}

/// Runs the sweep over every record in `store`. Per-record problems are
/// logged and collected; the sweep always visits every record.
pub fn reconcile_phases(store: &mut EventStore, today: NaiveDate) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for (venue, event_id, event) in store.iter_mut() {
        report.examined += 1;
        let outcome = end_date(&event.fields).and_then(|end| match end {
            Some(end) if end < today => mark_past(&mut event.fields).map(|changed| (true, changed)),
            _ => unmark_past(&mut event.fields).map(|changed| (false, changed)),
        });

        match outcome {
            Ok((true, true)) => {
                debug!(venue, event = event_id, "Marked event as past");
                report.marked_past += 1;
            }
            Ok((false, true)) => {
                debug!(venue, event = event_id, "Removed stale past tag");
                report.unmarked_past += 1;
            }
            Ok(_) => {}
            Err(e) => {
                error!(venue, event = event_id, "Error processing event: {}", e);
                report.errors.push(format!("{}: {}", event_id, e));
            }
        }
    }

    info!(
        "Phase reconciliation examined {} events: {} marked past, {} unmarked, {} errors",
        report.examined,
        report.marked_past,
        report.unmarked_past,
        report.errors.len()
    );
    report
}

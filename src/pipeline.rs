use crate::builder::EventRecordBuilder;
use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::fingerprint::{content_hash, ChangeDetector, ChangeType, EventKey};
use crate::reconcile::{reconcile_phases, ReconcileReport};
use crate::storage::{Storage, StoredEvent};
use crate::types::{EventRecord, RawEvent};
use chrono::NaiveDate;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of processing one batch of scraped events
#[derive(Debug, Default, Serialize)]
pub struct PipelineResult {
    pub total_events: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Events dropped because their venue was filtered out.
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl PipelineResult {
    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    fn record(&mut self, change: ChangeType) {
        match change {
            ChangeType::Created => self.created += 1,
            ChangeType::Updated => self.updated += 1,
            ChangeType::NoChange => self.unchanged += 1,
        }
    }
}

/// Which venues a run covers. Empty `only` means every venue.
#[derive(Debug, Clone, Default)]
pub struct VenueFilter {
    pub only: Vec<String>,
    pub skip: Vec<String>,
}

impl VenueFilter {
    pub fn allows(&self, venue: &str) -> bool {
        (self.only.is_empty() || self.only.iter().any(|v| v == venue))
            && !self.skip.iter().any(|v| v == venue)
    }
}

/// Build → fingerprint → store, one event at a time.
///
/// Every changed event is a full read-modify-write of the store document, so
/// exactly one pipeline may run against a store at a time.
pub struct Pipeline {
    storage: Arc<dyn Storage>,
    builder: EventRecordBuilder,
    dry_run: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("storage", &self.storage.location())
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Pipeline {
    pub fn new(storage: Arc<dyn Storage>, builder: EventRecordBuilder) -> Self {
        Self {
            storage,
            builder,
            dry_run: false,
        }
    }

    /// Pipeline over `region`'s JSON store, with the configured date tables.
    pub fn from_config(config: &AppConfig, region: &str, today: NaiveDate) -> Result<Self> {
        let storage = Arc::new(config.storage_for(region)?);
        let builder = EventRecordBuilder::new(config.date_normalizer(today)?);
        Ok(Self::new(storage, builder).with_dry_run(config.dry_run))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.builder.normalizer().today()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Builds the record for one scraped event and writes it if it is new
    /// or its content changed.
    #[instrument(skip(self, raw), fields(venue = %raw.venue, event = %raw.name))]
    pub fn process_event(&self, raw: &RawEvent) -> Result<ChangeType> {
        let record = self.builder.build(raw)?;
        self.upsert_record(&record)
    }

    /// Change detection and write for an already-built record.
    pub fn upsert_record(&self, record: &EventRecord) -> Result<ChangeType> {
        let key = EventKey::for_record(record);
        let hash = content_hash(record)?;

        let mut store = self.storage.load();
        let change = ChangeDetector::detect(&store, &key, &hash);

        if !change.needs_write() {
            debug!("No change for event: {}", key);
            counter!("museum_events_unchanged_total", "venue" => record.venue.clone()).increment(1);
            return Ok(change);
        }

        info!("Updating event: {} ({:?})", record.name, change);
        if self.dry_run {
            debug!("Dry run, not writing {}", key);
        } else {
            store.upsert(&key, StoredEvent::from_record(record, hash)?);
            self.storage.save(&store)?;
        }

        match change {
            ChangeType::Created => {
                counter!("museum_events_created_total", "venue" => record.venue.clone()).increment(1)
            }
            _ => counter!("museum_events_updated_total", "venue" => record.venue.clone()).increment(1),
        }
        Ok(change)
    }

    /// Processes a batch from one or more scrapers. A bad event is logged and
    /// skipped; a failed store write stops the batch.
    pub fn process_batch(&self, events: &[RawEvent], filter: &VenueFilter) -> Result<PipelineResult> {
        let mut result = PipelineResult {
            total_events: events.len(),
            ..PipelineResult::default()
        };

        for (i, raw) in events.iter().enumerate() {
            if !filter.allows(&raw.venue) {
                result.skipped += 1;
                continue;
            }
            match self.process_event(raw) {
                Ok(change) => result.record(change),
                Err(PipelineError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(
                        venue = %raw.venue,
                        dates = %raw.dates_text(),
                        link = raw.event_page().unwrap_or("-"),
                        "Skipping event {} ({}): {}",
                        i,
                        raw.name,
                        e
                    );
                    counter!("museum_events_errors_total", "venue" => raw.venue.clone()).increment(1);
                    result.errors.push(format!("{} @ {}: {}", raw.name, raw.venue, e));
                }
            }
        }

        info!(
            "Processed {} events: {} created, {} updated, {} unchanged, {} skipped, {} errors",
            result.total_events,
            result.created,
            result.updated,
            result.unchanged,
            result.skipped,
            result.errors.len()
        );
        Ok(result)
    }

    /// Store-wide phase correction. The store is saved even when some
    /// records could not be read.
    #[instrument(skip(self))]
    pub fn run_phase_reconciliation(&self) -> Result<ReconcileReport> {
        let mut store = self.storage.load();
        let report = reconcile_phases(&mut store, self.today());
        counter!("museum_events_reconciled_total").increment(report.changed() as u64);

        if self.dry_run {
            debug!("Dry run, not writing reconciled store");
        } else {
            self.storage.save(&store)?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EVENT_PAGE_LABEL;
    use crate::dates::DateNormalizer;
    use crate::storage::InMemoryStorage;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pipeline(storage: Arc<InMemoryStorage>) -> Pipeline {
        let builder = EventRecordBuilder::new(DateNormalizer::for_today(ymd(2024, 6, 15)));
        Pipeline::new(storage, builder)
    }

    fn raw(name: &str, venue: &str) -> RawEvent {
        RawEvent::new(name, venue)
            .with_dates(Some(ymd(2024, 1, 1)), Some(ymd(2024, 2, 1)))
            .with_link(format!("https://example.org/{}", name), EVENT_PAGE_LABEL)
    }

    #[test]
    fn test_same_event_twice_writes_once() {
        let storage = Arc::new(InMemoryStorage::new());
        let p = pipeline(storage.clone());

        assert_eq!(p.process_event(&raw("A", "V")).unwrap(), ChangeType::Created);
        let first = storage.snapshot().get("V", "A-V").unwrap().hash.clone();
        assert_eq!(p.process_event(&raw("A", "V")).unwrap(), ChangeType::NoChange);

        assert_eq!(storage.writes(), 1);
        let store = storage.snapshot();
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.get("V", "A-V").unwrap().hash, first);
    }

    #[test]
    fn test_description_change_rewrites() {
        let storage = Arc::new(InMemoryStorage::new());
        let p = pipeline(storage.clone());

        p.process_event(&raw("A", "V").with_description("one")).unwrap();
        let before = storage.snapshot().get("V", "A-V").unwrap().hash.clone();
        assert_eq!(
            p.process_event(&raw("A", "V").with_description("two")).unwrap(),
            ChangeType::Updated
        );
        let after = storage.snapshot().get("V", "A-V").unwrap().clone();
        assert_ne!(after.hash, before);
        assert_eq!(after.fields["description"], serde_json::json!("two"));
        assert_eq!(storage.writes(), 2);
    }

    #[test]
    fn test_dry_run_never_writes() {
        let storage = Arc::new(InMemoryStorage::new());
        let p = pipeline(storage.clone()).with_dry_run(true);
        assert_eq!(p.process_event(&raw("A", "V")).unwrap(), ChangeType::Created);
        p.run_phase_reconciliation().unwrap();
        assert_eq!(storage.writes(), 0);
        assert!(storage.snapshot().is_empty());
    }

    #[test]
    fn test_batch_skips_bad_events_and_filtered_venues() {
        let storage = Arc::new(InMemoryStorage::new());
        let p = pipeline(storage.clone());
        let events = vec![
            raw("A", "V"),
            RawEvent::new("Broken", "V")
                .with_dates_text("Smarch 3")
                .with_link("https://example.org/broken", EVENT_PAGE_LABEL),
            raw("B", "W"),
            raw("C", "V"),
        ];
        let filter = VenueFilter {
            only: vec![],
            skip: vec!["W".to_string()],
        };

        let result = p.process_batch(&events, &filter).unwrap();
        assert_eq!(result.total_events, 4);
        assert_eq!(result.created, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Broken"));
        assert_eq!(storage.snapshot().event_count(), 2);
    }

    #[test]
    fn test_reconciliation_after_processing() {
        let storage = Arc::new(InMemoryStorage::new());
        let p = pipeline(storage.clone());
        let mut event = raw("A", "V");
        event.phase_hint = Some(crate::types::Phase::Current);
        p.process_event(&event).unwrap();

        let report = p.run_phase_reconciliation().unwrap();
        assert_eq!(report.marked_past, 1);
        let store = storage.snapshot();
        let stored = store.get("V", "A-V").unwrap();
        assert_eq!(stored.fields["phase"], serde_json::json!("past"));

        // the venue still reports "current": hash unchanged, so no rewrite
        assert_eq!(p.process_event(&event).unwrap(), ChangeType::NoChange);
    }

    #[test]
    fn test_venue_filter() {
        let filter = VenueFilter {
            only: vec!["SFMOMA".into()],
            skip: vec![],
        };
        assert!(filter.allows("SFMOMA"));
        assert!(!filter.allows("BAMPFA"));
        assert!(VenueFilter::default().allows("anything"));
    }
}

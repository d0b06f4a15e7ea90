use crate::error::StoreError;
use crate::fingerprint::EventKey;
use crate::types::EventRecord;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, error, warn};

/// String literals, or bare non-finite numbers outside them.
static NON_FINITE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|-?\bInfinity\b|\bNaN\b"#).expect("valid non-finite regex")
});

/// A persisted record: the record's fields as written, plus its content hash.
///
/// Fields are kept as JSON so records written by older builds (missing or
/// extra fields, odd date strings) survive a load/save cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub hash: String,
}

impl StoredEvent {
    pub fn from_record(record: &EventRecord, hash: String) -> Result<Self, serde_json::Error> {
        let fields = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Self { fields, hash })
    }

    /// Reads a stored object as-is. A missing, null or non-string hash reads
    /// as empty, so the next ingest of that event rewrites it.
    fn from_value(value: Value) -> Option<Self> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            _ => return None,
        };
        let hash = match fields.remove("hash") {
            Some(Value::String(hash)) => hash,
            _ => String::new(),
        };
        Some(Self { fields, hash })
    }
}

type VenueEvents = BTreeMap<String, StoredEvent>;

/// venue → event id (`"{name}-{venue}"`) → stored record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventStore {
    venues: BTreeMap<String, VenueEvents>,
}

impl EventStore {
    /// Builds a store from a parsed document one record at a time. Entries
    /// that are not objects are dropped with a warning; everything else is
    /// kept.
    pub fn from_document(document: Map<String, Value>) -> Self {
        let mut store = Self::default();
        for (venue, events) in document {
            let events = match events {
                Value::Object(events) => events,
                other => {
                    warn!(venue = %venue, "Dropping venue entry that is not an object: {}", other);
                    continue;
                }
            };
            let entry = store.venues.entry(venue.clone()).or_default();
            for (event_id, value) in events {
                match StoredEvent::from_value(value) {
                    Some(event) => {
                        entry.insert(event_id, event);
                    }
                    None => warn!(venue = %venue, event = %event_id, "Dropping event entry that is not an object"),
                }
            }
        }
        store
    }

    pub fn get(&self, venue: &str, event_id: &str) -> Option<&StoredEvent> {
        self.venues.get(venue).and_then(|events| events.get(event_id))
    }

    pub fn venue_events(&self, venue: &str) -> Option<&BTreeMap<String, StoredEvent>> {
        self.venues.get(venue)
    }

    /// Inserts or overwrites the record under `key`.
    pub fn upsert(&mut self, key: &EventKey, event: StoredEvent) {
        self.venues
            .entry(key.venue.clone())
            .or_default()
            .insert(key.to_string(), event);
    }

    pub fn venue_count(&self) -> usize {
        self.venues.len()
    }

    pub fn event_count(&self) -> usize {
        self.venues.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &StoredEvent)> + '_ {
        self.venues.iter().flat_map(|(venue, events)| {
            events
                .iter()
                .map(move |(id, event)| (venue.as_str(), id.as_str(), event))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &str, &mut StoredEvent)> + '_ {
        self.venues.iter_mut().flat_map(|(venue, events)| {
            events
                .iter_mut()
                .map(move |(id, event)| (venue.as_str(), id.as_str(), event))
        })
    }
}

/// How the JSON document is read and written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Create an empty `{}` document when the store file does not exist.
    pub create_if_missing: bool,
    /// Spaces per indentation level in the written document.
    pub indent: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            indent: 4,
        }
    }
}

/// Rewrites bare `NaN`, `Infinity` and `-Infinity` (written by tools that
/// emit non-standard JSON) to `null`. String contents are left alone.
fn null_non_finite(content: &str) -> Cow<'_, str> {
    NON_FINITE.replace_all(content, |caps: &Captures| {
        let matched = &caps[0];
        if matched.starts_with('"') {
            matched.to_string()
        } else {
            "null".to_string()
        }
    })
}

/// Parses a store document. Only a document that is not JSON at all, or
/// whose top level is not an object, reads as an empty store.
fn parse_document(path: &Path, content: &str) -> EventStore {
    match serde_json::from_str::<Value>(&null_non_finite(content)) {
        Ok(Value::Object(document)) => EventStore::from_document(document),
        Ok(other) => {
            warn!("Database file {} is not an object: {}", path.display(), other);
            EventStore::default()
        }
        Err(e) => {
            warn!("Database file {} is not valid JSON: {}", path.display(), e);
            EventStore::default()
        }
    }
}

/// Reads the store document. Never fails: a missing, empty or malformed
/// document is an empty store, and a malformed record is dropped on its own.
pub fn load_store(path: &Path, options: &StoreOptions) -> EventStore {
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => {
            warn!("Database file {} is empty", path.display());
            EventStore::default()
        }
        Ok(content) => parse_document(path, &content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Database file {} not found", path.display());
            if options.create_if_missing {
                if let Err(e) = write_document(path, b"{}") {
                    warn!("Could not create empty database file: {}", e);
                }
            }
            EventStore::default()
        }
        Err(e) => {
            error!("Failed to read database file {}: {}", path.display(), e);
            EventStore::default()
        }
    }
}

/// Overwrites the whole document. Dates are already strings in the stored
/// fields.
pub fn save_store(store: &EventStore, path: &Path, options: &StoreOptions) -> Result<(), StoreError> {
    let indent = vec![b' '; options.indent];
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    store.serialize(&mut serializer)?;

    write_document(path, &buf)?;
    debug!(
        "Saved {} events across {} venues to {}",
        store.event_count(),
        store.venue_count(),
        path.display()
    );
    Ok(())
}

/// Writes through a sibling temp file so a failed write leaves the previous
/// document in place.
fn write_document(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let to_store_error = |source: std::io::Error| StoreError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(to_store_error)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(to_store_error)?;
    fs::rename(&tmp, path).map_err(to_store_error)?;
    Ok(())
}

/// Persistence boundary for the event store
pub trait Storage: Send + Sync {
    fn load(&self) -> EventStore;
    fn save(&self, store: &EventStore) -> Result<(), StoreError>;
    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// One JSON document per region on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
    options: StoreOptions,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> EventStore {
        load_store(&self.path, &self.options)
    }

    fn save(&self, store: &EventStore) -> Result<(), StoreError> {
        save_store(store, &self.path, &self.options)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory storage implementation for development/testing
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    store: Mutex<EventStore>,
    writes: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> EventStore {
        self.load()
    }
}

impl Storage for InMemoryStorage {
    fn load(&self) -> EventStore {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn save(&self, store: &EventStore) -> Result<(), StoreError> {
        *self
            .store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = store.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

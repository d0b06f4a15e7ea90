use crate::constants::OBSERVATIONAL_FIELDS;
use crate::storage::EventStore;
use crate::types::EventRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of an exhibition within the store: name plus venue.
///
/// A venue renaming an exhibition therefore produces a new key; the old
/// record stays behind untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub name: String,
    pub venue: String,
}

impl EventKey {
    pub fn new(name: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            venue: venue.into(),
        }
    }

    pub fn for_record(record: &EventRecord) -> Self {
        Self::new(record.name.clone(), record.venue.clone())
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.venue)
    }
}

/// What the store needs to do with an incoming record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Updated,
    NoChange,
}

impl ChangeType {
    pub fn needs_write(&self) -> bool {
        !matches!(self, ChangeType::NoChange)
    }
}

/// Hex SHA-256 over the record serialized with sorted keys, observational
/// fields (`last_updated`) removed.
pub fn content_hash(record: &EventRecord) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        for field in OBSERVATIONAL_FIELDS {
            map.remove(*field);
        }
    }
    // serde_json maps are ordered by key, so this is canonical
    let canonical = serde_json::to_string(&value)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Compares incoming records against what the store already holds.
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn detect(store: &EventStore, key: &EventKey, hash: &str) -> ChangeType {
        let existing = store
            .venue_events(&key.venue)
            .and_then(|events| events.get(&key.to_string()));
        match existing {
            None => ChangeType::Created,
            Some(existing) if existing.hash != hash => ChangeType::Updated,
            Some(_) => ChangeType::NoChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoredEvent;
    use crate::types::{EventDates, EventLink, Phase};
    use chrono::NaiveDate;

    fn record() -> EventRecord {
        EventRecord {
            name: "A".to_string(),
            venue: "V".to_string(),
            description: Some("First".to_string()),
            tags: vec!["exhibition".into(), "current".into(), "museum".into()],
            phase: Some(Phase::Current),
            dates: EventDates {
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: NaiveDate::from_ymd_opt(2024, 2, 1),
            },
            ongoing: false,
            links: vec![EventLink {
                link: "https://example.org/a".into(),
                description: "Event Page".into(),
            }],
            last_updated: "2024-01-15 08:00:00".to_string(),
        }
    }

    #[test]
    fn test_event_key_format() {
        assert_eq!(EventKey::for_record(&record()).to_string(), "A-V");
    }

    #[test]
    fn test_hash_ignores_last_updated() {
        let a = record();
        let mut b = record();
        b.last_updated = "2030-12-31 23:59:59".to_string();
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());
    }

    #[test]
    fn test_hash_tracks_content() {
        let a = record();
        let mut b = record();
        b.description = Some("Second".to_string());
        assert_ne!(content_hash(&a).unwrap(), content_hash(&b).unwrap());

        let mut c = record();
        c.dates.end = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_ne!(content_hash(&a).unwrap(), content_hash(&c).unwrap());

        let hash = content_hash(&a).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash(&record()).unwrap());
    }

    #[test]
    fn test_detect_decisions() {
        let rec = record();
        let key = EventKey::for_record(&rec);
        let hash = content_hash(&rec).unwrap();
        let mut store = EventStore::default();

        assert_eq!(ChangeDetector::detect(&store, &key, &hash), ChangeType::Created);

        store.upsert(&key, StoredEvent::from_record(&rec, hash.clone()).unwrap());
        assert_eq!(ChangeDetector::detect(&store, &key, &hash), ChangeType::NoChange);
        assert_eq!(ChangeDetector::detect(&store, &key, "different"), ChangeType::Updated);
        assert!(!ChangeType::NoChange.needs_write());
    }
}

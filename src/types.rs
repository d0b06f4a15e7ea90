use crate::constants::{CURRENT_TAG, FUTURE_TAG, GALLERY_TAG, MUSEUM_TAG, PAST_TAG};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an exhibition relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Past,
    Current,
    Future,
}

impl Phase {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Phase::Past => PAST_TAG,
            Phase::Current => CURRENT_TAG,
            Phase::Future => FUTURE_TAG,
        }
    }

    pub fn is_phase_tag(tag: &str) -> bool {
        matches!(tag, PAST_TAG | CURRENT_TAG | FUTURE_TAG)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    #[default]
    Museum,
    Gallery,
}

impl VenueKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            VenueKind::Museum => MUSEUM_TAG,
            VenueKind::Gallery => GALLERY_TAG,
        }
    }
}

/// Start/end pair; either side may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDates {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLink {
    pub link: String,
    pub description: String,
}

/// The canonical exhibition record, as persisted (minus the hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub venue: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub phase: Option<Phase>,
    pub dates: EventDates,
    pub ongoing: bool,
    pub links: Vec<EventLink>,
    /// UTC observation time. Not part of the content hash.
    pub last_updated: String,
}

/// Dates as a scraper hands them over: free text, or already structured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatesInput {
    Text(String),
    Structured {
        #[serde(default)]
        start: Option<NaiveDate>,
        #[serde(default)]
        end: Option<NaiveDate>,
        #[serde(default)]
        ongoing: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub link: Option<String>,
    pub description: String,
}

impl RawLink {
    pub fn new(link: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            description: description.into(),
        }
    }
}

/// Per-event fields extracted by a venue scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub name: String,
    pub venue: String,
    #[serde(default)]
    pub venue_kind: VenueKind,
    #[serde(default, alias = "dates_text")]
    pub dates: Option<DatesInput>,
    #[serde(default)]
    pub tags_hint: Vec<String>,
    #[serde(default)]
    pub links: Vec<RawLink>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ongoing_hint: Option<bool>,
    /// Phase as reported by the venue listing (which page/section it came from).
    #[serde(default)]
    pub phase_hint: Option<Phase>,
}

impl RawEvent {
    pub fn new(name: impl Into<String>, venue: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            venue: venue.into(),
            venue_kind: VenueKind::Museum,
            dates: None,
            tags_hint: Vec::new(),
            links: Vec::new(),
            description: None,
            ongoing_hint: None,
            phase_hint: None,
        }
    }

    pub fn with_dates_text(mut self, text: impl Into<String>) -> Self {
        self.dates = Some(DatesInput::Text(text.into()));
        self
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.dates = Some(DatesInput::Structured {
            start,
            end,
            ongoing: None,
        });
        self
    }

    pub fn with_link(mut self, link: impl Into<String>, description: impl Into<String>) -> Self {
        self.links.push(RawLink::new(link, description));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_kind(mut self, kind: VenueKind) -> Self {
        self.venue_kind = kind;
        self
    }

    /// Event page link for log context, if the scraper found one.
    pub fn event_page(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.description == crate::constants::EVENT_PAGE_LABEL)
            .and_then(|l| l.link.as_deref())
    }

    /// Raw date text for log context.
    pub fn dates_text(&self) -> String {
        match &self.dates {
            Some(DatesInput::Text(t)) => t.clone(),
            Some(DatesInput::Structured { start, end, ongoing }) => {
                format!("{:?}..{:?} ongoing={:?}", start, end, ongoing)
            }
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_event_accepts_text_or_structured_dates() {
        let text: RawEvent = serde_json::from_value(json!({
            "name": "A",
            "venue": "V",
            "dates_text": "january 5 – march 10 2024",
        }))
        .unwrap();
        assert_eq!(
            text.dates,
            Some(DatesInput::Text("january 5 – march 10 2024".to_string()))
        );

        let structured: RawEvent = serde_json::from_value(json!({
            "name": "A",
            "venue": "V",
            "dates": {"start": "2024-01-01", "end": "2024-02-01"},
        }))
        .unwrap();
        assert_eq!(
            structured.dates,
            Some(DatesInput::Structured {
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: NaiveDate::from_ymd_opt(2024, 2, 1),
                ongoing: None,
            })
        );
        assert_eq!(structured.venue_kind, VenueKind::Museum);
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Phase::Current).unwrap(), json!("current"));
        let dates = EventDates {
            start: NaiveDate::from_ymd_opt(2024, 1, 5),
            end: None,
        };
        assert_eq!(
            serde_json::to_value(dates).unwrap(),
            json!({"start": "2024-01-05", "end": null})
        );
    }
}

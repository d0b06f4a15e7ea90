use crate::constants::{EVENT_PAGE_LABEL, EXHIBITION_TAG, LAST_UPDATED_FORMAT};
use crate::dates::{DateNormalizer, ParsedDates};
use crate::error::ValidationError;
use crate::phase;
use crate::types::{DatesInput, EventDates, EventLink, EventRecord, Phase, RawEvent, VenueKind};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Turns scraper output into canonical [`EventRecord`]s. Touches no storage.
#[derive(Debug, Clone)]
pub struct EventRecordBuilder {
    normalizer: DateNormalizer,
}

impl EventRecordBuilder {
    pub fn new(normalizer: DateNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &DateNormalizer {
        &self.normalizer
    }

    pub fn build(&self, raw: &RawEvent) -> Result<EventRecord, ValidationError> {
        self.build_at(raw, Utc::now())
    }

    /// Builds the record with `now` as its `last_updated` stamp.
    pub fn build_at(&self, raw: &RawEvent, now: DateTime<Utc>) -> Result<EventRecord, ValidationError> {
        let name = required(&raw.name, "name")?;
        let venue = required(&raw.venue, "venue")?;

        let parsed = self.resolve_dates(&name, raw.dates.as_ref())?;
        let ongoing = parsed.ongoing || raw.ongoing_hint.unwrap_or(false);

        if let (Some(start), Some(end)) = (parsed.start, parsed.end) {
            if start > end {
                return Err(ValidationError::InvertedDates { name, start, end });
            }
        }

        let phase = raw
            .phase_hint
            .or_else(|| phase::classify(parsed.start, parsed.end, ongoing, self.normalizer.today()));

        let links = build_links(&name, raw)?;
        let tags = build_tags(phase, raw.venue_kind, &raw.tags_hint);

        debug!(event = %name, venue = %venue, ?phase, "Built event record");

        Ok(EventRecord {
            name,
            venue,
            description: raw.description.as_deref().and_then(clean_description),
            tags,
            phase,
            dates: EventDates {
                start: parsed.start,
                end: parsed.end,
            },
            ongoing,
            links,
            last_updated: now.format(LAST_UPDATED_FORMAT).to_string(),
        })
    }

    fn resolve_dates(&self, name: &str, dates: Option<&DatesInput>) -> Result<ParsedDates, ValidationError> {
        match dates {
            None => Ok(ParsedDates::default()),
            Some(DatesInput::Text(text)) => {
                self.normalizer
                    .parse_expression(text)
                    .map_err(|source| ValidationError::Dates {
                        name: name.to_string(),
                        source,
                    })
            }
            Some(DatesInput::Structured { start, end, ongoing }) => Ok(ParsedDates {
                start: *start,
                end: *end,
                ongoing: ongoing.unwrap_or(false),
            }),
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn clean_description(text: &str) -> Option<String> {
    let cleaned = text.replace('\u{a0}', " ");
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// `exhibition`, the phase tag, the venue-kind tag, then any scraper hints.
/// Hinted phase words are dropped; the phase tag always follows `phase`.
fn build_tags(phase: Option<Phase>, kind: VenueKind, hints: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(3 + hints.len());
    let mut push = |tag: &str| {
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    };

    push(EXHIBITION_TAG);
    if let Some(phase) = phase {
        push(phase.as_tag());
    }
    push(kind.as_tag());
    for hint in hints {
        let hint = hint.trim().to_lowercase();
        if !Phase::is_phase_tag(&hint) {
            push(&hint);
        }
    }
    tags
}

/// Event page first, then every other usable link in scraper order.
fn build_links(name: &str, raw: &RawEvent) -> Result<Vec<EventLink>, ValidationError> {
    let usable = raw.links.iter().filter_map(|l| {
        let link = l.link.as_deref()?.trim();
        (!link.is_empty()).then(|| EventLink {
            link: link.to_string(),
            description: l.description.trim().to_string(),
        })
    });

    let mut links: Vec<EventLink> = Vec::new();
    let mut others: Vec<EventLink> = Vec::new();
    for link in usable {
        if link.description == EVENT_PAGE_LABEL && links.is_empty() {
            links.push(link);
        } else if !others.contains(&link) {
            others.push(link);
        }
    }

    if links.is_empty() {
        return Err(ValidationError::MissingEventPage(name.to_string()));
    }
    let page = links[0].clone();
    links.extend(others.into_iter().filter(|l| *l != page));
    Ok(links)
}

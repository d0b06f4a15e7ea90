/// Tag every record carries.
pub const EXHIBITION_TAG: &str = "exhibition";

/// Phase tags, also the serialized `phase` values.
pub const PAST_TAG: &str = "past";
pub const CURRENT_TAG: &str = "current";
pub const FUTURE_TAG: &str = "future";

/// Venue-kind tags.
pub const MUSEUM_TAG: &str = "museum";
pub const GALLERY_TAG: &str = "gallery";

/// Link labels the site front end keys on.
pub const EVENT_PAGE_LABEL: &str = "Event Page";
pub const IMAGE_LABEL: &str = "Image";

/// Range separator every dash variant is normalized to.
pub const RANGE_SEPARATOR: &str = "–";

/// Stored date format for `dates.start` / `dates.end`.
pub const STORE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format of the `last_updated` observation timestamp (UTC).
pub const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Record fields that describe when a record was observed rather than what it
/// says. They are left out of the content hash.
pub const OBSERVATIONAL_FIELDS: &[&str] = &["last_updated"];

// Configuration defaults
pub const DEFAULT_CONFIG_PATH: &str = "museum_events.toml";
pub const CONFIG_PATH_ENV: &str = "MUSEUM_EVENTS_CONFIG";
pub const REGION_ENV: &str = "MUSEUM_EVENTS_REGION";
pub const DEFAULT_REGION: &str = "sf";
pub const DEFAULT_SF_STORE: &str = "docs/events_db.json";
pub const DEFAULT_LA_STORE: &str = "docs/la_events_db.json";
pub const DEFAULT_SUMMARY_CSV: &str = "docs/db_size.csv";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "museum_events.log";
pub const DEFAULT_LOG_FILTER: &str = "museum_events=info";

/// Month names and abbreviations understood out of the box.
pub const DEFAULT_MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

/// Season words and the approximate month/day they stand for.
pub const DEFAULT_SEASONS: &[(&str, &str)] = &[
    ("fall", "sep 20"),
    ("winter", "dec 20"),
    ("spring", "mar 20"),
    ("summer", "jun 20"),
];

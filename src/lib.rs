pub mod builder;
pub mod config;
pub mod constants;
pub mod dates;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod phase;
pub mod pipeline;
pub mod reconcile;
pub mod storage;
pub mod summary;
pub mod types;

pub use builder::EventRecordBuilder;
pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use fingerprint::{ChangeType, EventKey};
pub use pipeline::{Pipeline, PipelineResult, VenueFilter};
pub use storage::{EventStore, InMemoryStorage, JsonFileStorage, Storage};
pub use types::{EventRecord, Phase, RawEvent};

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, DEFAULT_LA_STORE, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE,
    DEFAULT_LOG_FILTER, DEFAULT_REGION, DEFAULT_SF_STORE, DEFAULT_SUMMARY_CSV, REGION_ENV,
};
use crate::dates::{DateNormalizer, MonthTable, SeasonTable};
use crate::error::ConfigError;
use crate::storage::{JsonFileStorage, StoreOptions};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where one region's store document lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub store_path: PathBuf,
}

/// Month table and season anchor overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatesConfig {
    pub months: HashMap<String, u32>,
    pub seasons: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub csv_path: PathBuf,
    /// Copy the store document aside before a full run.
    pub backup: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_SUMMARY_CSV),
            backup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Daily-rolling file logs go here; `None` logs to the console only.
    pub directory: Option<PathBuf>,
    pub file_name: String,
    /// JSON lines in the file layer.
    pub json: bool,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            file_name: DEFAULT_LOG_FILE.to_string(),
            json: true,
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Everything the pipeline reads from the environment, passed around
/// explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_region: String,
    /// Parse, build and diff, but never write the store.
    pub dry_run: bool,
    pub regions: BTreeMap<String, RegionConfig>,
    pub store: StoreOptions,
    pub dates: DatesConfig,
    pub summary: SummaryConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(
            "sf".to_string(),
            RegionConfig {
                store_path: PathBuf::from(DEFAULT_SF_STORE),
            },
        );
        regions.insert(
            "la".to_string(),
            RegionConfig {
                store_path: PathBuf::from(DEFAULT_LA_STORE),
            },
        );
        Self {
            default_region: DEFAULT_REGION.to_string(),
            dry_run: false,
            regions,
            store: StoreOptions::default(),
            dates: DatesConfig::default(),
            summary: SummaryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads `.env`, then the TOML file at `path`, else `$MUSEUM_EVENTS_CONFIG`,
    /// else `museum_events.toml`. Only an explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        let config_path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = match fs::read_to_string(&config_path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", config_path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: config_path.display().to_string(),
                    source,
                })
            }
        };

        if let Ok(region) = std::env::var(REGION_ENV) {
            if !region.trim().is_empty() {
                config.default_region = region.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn region(&self, name: &str) -> Result<&RegionConfig, ConfigError> {
        self.regions
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRegion(name.to_string()))
    }

    /// File storage for `region`. A dry run never creates the store file.
    pub fn storage_for(&self, region: &str) -> Result<JsonFileStorage, ConfigError> {
        let region = self.region(region)?;
        let mut options = self.store.clone();
        if self.dry_run {
            options.create_if_missing = false;
        }
        Ok(JsonFileStorage::new(region.store_path.clone(), options))
    }

    pub fn date_normalizer(&self, today: NaiveDate) -> Result<DateNormalizer, ConfigError> {
        Ok(DateNormalizer::new(
            MonthTable::with_overrides(&self.dates.months)?,
            SeasonTable::with_overrides(&self.dates.seasons),
            today,
        ))
    }
}

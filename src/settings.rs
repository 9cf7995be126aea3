//! # Settings Module
//!
//! ## Purpose
//! One serializable structure with every tunable of the calculation: where the
//! reference dataset lives, how many rows a search may return, how many
//! candidates survive the filter, the size of the worker pool, retry and cache
//! policy of the store, integration method, extrapolation limit, default grid
//! step, request timeout and log level.
//!
//! ## Loading
//! Settings are read from a JSON file. A missing file is not an error: the
//! defaults are used and the fact is logged. Keys absent from the file keep
//! their default value, so a file may name only what it changes:
//! ```json
//! {
//!   "dataset_path": "data/compounds_full.json",
//!   "max_concurrency": 4,
//!   "request_timeout_ms": 2000
//! }
//! ```
//!
//! ## Usage Pattern
//! ```rust,no_run
//! use ThermoReact::settings::ThermoSettings;
//!
//! let settings = ThermoSettings::from_file("thermo_settings.json").unwrap();
//! assert!(settings.max_concurrency >= 1);
//! ```
//! Settings are handed to [`crate::Thermodynamics::thermo_lib_api::ThermoData`]
//! explicitly; there is no global instance.
use crate::Thermodynamics::thermo_engine::{DEFAULT_SIMPSON_INTERVALS, IntegrationMethod};
use crate::Thermodynamics::thermo_errors::ThermoError;
use crate::Utils::load_from_file::parse_json_with_context;
use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// default location of the settings file
pub const SETTINGS_FILE: &str = "thermo_settings.json";

/// Tunables of the search and calculation pipeline.
///
/// # Fields
/// * `dataset_path` - JSON array of compound records
/// * `query_row_cap` - rows one store search may return
/// * `candidate_cap` - candidates kept after the final ranking
/// * `max_concurrency` - worker threads resolving compounds of one request
/// * `retry_attempts`, `retry_backoff_ms` - store retries, the delay doubling each time
/// * `cache_capacity` - search results kept in the LRU cache, 0 disables it
/// * `integration_method` - closed form or Simpson quadrature
/// * `max_extrapolation_k` - distance beyond the data that is still extrapolated
/// * `default_temperature_step` - grid step when the request gives none
/// * `request_timeout_ms` - resolution deadline, none by default
/// * `log_level` - "error", "warn", "info", "debug" or "trace"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermoSettings {
    pub dataset_path: String,
    pub query_row_cap: usize,
    pub candidate_cap: usize,
    pub max_concurrency: usize,
    pub retry_attempts: usize,
    pub retry_backoff_ms: u64,
    pub cache_capacity: usize,
    pub integration_method: IntegrationMethod,
    pub max_extrapolation_k: f64,
    pub default_temperature_step: f64,
    pub request_timeout_ms: Option<u64>,
    pub log_level: String,
}

impl Default for ThermoSettings {
    fn default() -> Self {
        Self {
            dataset_path: "data/sample_compounds.json".to_string(),
            query_row_cap: 100,
            candidate_cap: 20,
            max_concurrency: 10,
            retry_attempts: 3,
            retry_backoff_ms: 50,
            cache_capacity: 1024,
            integration_method: IntegrationMethod::ClosedForm,
            max_extrapolation_k: 50.0,
            default_temperature_step: 100.0,
            request_timeout_ms: None,
            log_level: "info".to_string(),
        }
    }
}

impl ThermoSettings {
    /// Loads settings from a JSON file; defaults when the file does not exist.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ThermoError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "settings file '{}' not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ThermoError::DatasetLoad(format!("'{}': {}", path.display(), e)))?;
        let settings: ThermoSettings =
            parse_json_with_context(&content, &path.display().to_string())
                .map_err(ThermoError::DatasetLoad)?;
        info!("settings loaded from '{}'", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ThermoError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ThermoError::DatasetLoad(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| ThermoError::DatasetLoad(format!("'{}': {}", path.display(), e)))
    }

    /// Simpson quadrature with the default number of intervals
    pub fn with_simpson(mut self) -> Self {
        self.integration_method = IntegrationMethod::Simpson {
            intervals: DEFAULT_SIMPSON_INTERVALS,
        };
        self
    }

    pub fn with_dataset(mut self, path: impl AsRef<Path>) -> Self {
        self.dataset_path = path.as_ref().display().to_string();
        self
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn log_level_filter(&self) -> LevelFilter {
        match self.log_level.trim().to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            other => {
                warn!("unknown log level '{}', using info", other);
                LevelFilter::Info
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = ThermoSettings::from_file("/nonexistent/thermo_settings.json").unwrap();
        assert_eq!(settings, ThermoSettings::default());
        assert_eq!(settings.query_row_cap, 100);
        assert_eq!(settings.candidate_cap, 20);
        assert_eq!(settings.max_concurrency, 10);
        assert_eq!(settings.request_timeout(), None);
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_concurrency": 4, "request_timeout_ms": 2000, "log_level": "debug",
                "integration_method": {{"Simpson": {{"intervals": 200}}}}}}"#
        )
        .unwrap();
        let settings = ThermoSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(settings.log_level_filter(), LevelFilter::Debug);
        assert_eq!(
            settings.integration_method,
            IntegrationMethod::Simpson { intervals: 200 }
        );
        assert_eq!(settings.candidate_cap, 20);
    }

    #[test]
    fn test_save_and_reload() {
        let file = NamedTempFile::new().unwrap();
        let settings = ThermoSettings::default().with_simpson().with_dataset("other.json");
        settings.save(file.path()).unwrap();
        assert_eq!(ThermoSettings::from_file(file.path()).unwrap(), settings);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"max_concurrency\": }}").unwrap();
        assert!(matches!(
            ThermoSettings::from_file(file.path()),
            Err(ThermoError::DatasetLoad(_))
        ));
    }
}

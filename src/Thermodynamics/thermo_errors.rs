//! # Error and warning taxonomy
//!
//! Hard failures of a request are [`ThermoError`] values. Everything that only
//! degrades a result (missing compound, temperature without data, phase chosen
//! by fallback, extrapolation) is a [`ThermoWarning`] collected in a
//! [`WarningLog`] and returned together with the data.
use crate::Thermodynamics::DBhandlers::compound_record::Phase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// errors of the record store layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reference dataset unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: usize, reason: String },
    #[error("failed to read dataset file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset: {0}")]
    Parse(String),
}

impl StoreError {
    /// I/O failures may go away on a retry, a malformed dataset will not
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io { .. })
    }
}

/// errors of the Cp/H/S/G evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThermoEngineError {
    #[error("temperature must be positive and finite, got {0} K")]
    InvalidTemperature(f64),
    #[error("{quantity} is not finite at {temperature} K for record {record_id}")]
    NonFinite {
        quantity: &'static str,
        temperature: f64,
        record_id: u64,
    },
}

/// errors of request validation and reaction equation parsing
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("request must name between 1 and {max} compounds, got {got}")]
    CompoundCount { got: usize, max: usize },
    #[error("empty compound formula at position {0}")]
    EmptyFormula(usize),
    #[error("invalid temperature range [{0}, {1}]")]
    TemperatureRange(f64, f64),
    #[error("temperature step must be positive, got {0}")]
    TemperatureStep(f64),
    #[error("{phases} phase hints given for {compounds} compounds")]
    PhaseCount { phases: usize, compounds: usize },
    #[error("unknown phase '{0}'")]
    UnknownPhase(String),
    #[error("{formula} is requested both as {first} and as {second}")]
    ConflictingPhase {
        formula: String,
        first: Phase,
        second: Phase,
    },
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    #[error("cannot parse reaction equation '{equation}': {reason}")]
    EquationParse { equation: String, reason: String },
}

/// hard failures of a whole request
#[derive(Debug, Error)]
pub enum ThermoError {
    #[error("compound(s) not found: {}", .missing.join(", "))]
    NotFound { missing: Vec<String> },
    #[error("no data for {formula} at {temperature} K")]
    TemperatureOutOfRange { formula: String, temperature: f64 },
    #[error("numerical integration failed: {0}")]
    NumericalIntegration(#[from] ThermoEngineError),
    #[error(transparent)]
    DataStoreUnavailable(#[from] StoreError),
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("failed to load {0}")]
    DatasetLoad(String),
    #[error("request timed out after {0:?}")]
    RequestTimeout(std::time::Duration),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// kinds of non-fatal problems; the dedup key of a warning is (compound, kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WarningKind {
    NotFound,
    CoverageGap,
    AmbiguousPhase,
    TemperatureOutOfRange,
    Extrapolation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermoWarning {
    pub compound: Option<String>,
    pub kind: WarningKind,
    pub message: String,
    /// temperatures the warning applies to (empty when it is not T-specific)
    pub temperatures: Vec<f64>,
}

impl ThermoWarning {
    pub fn new(compound: Option<&str>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            compound: compound.map(str::to_owned),
            kind,
            message: message.into(),
            temperatures: Vec::new(),
        }
    }

    pub fn at(mut self, temperature: f64) -> Self {
        self.temperatures.push(temperature);
        self
    }
}

/// ordered, deduplicated collection of warnings
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    warnings: Vec<ThermoWarning>,
    index: HashMap<(Option<String>, WarningKind), usize>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }
    /// adds a warning; a repeated (compound, kind) pair only extends the temperature list
    pub fn push(&mut self, warning: ThermoWarning) {
        let key = (warning.compound.clone(), warning.kind);
        match self.index.get(&key) {
            Some(&i) => {
                let existing = &mut self.warnings[i];
                for t in warning.temperatures {
                    if !existing.temperatures.iter().any(|&x| x == t) {
                        existing.temperatures.push(t);
                    }
                }
            }
            None => {
                log::warn!(
                    "{}: {}",
                    warning.compound.as_deref().unwrap_or("reaction"),
                    warning.message
                );
                self.index.insert(key, self.warnings.len());
                self.warnings.push(warning);
            }
        }
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = ThermoWarning>) {
        for w in warnings {
            self.push(w);
        }
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_vec(self) -> Vec<ThermoWarning> {
        self.warnings
    }
}

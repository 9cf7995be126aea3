//! # ThermoData
//!
//! Entry point of the crate. A `ThermoData` owns the record store, the
//! resolver with its filter pipeline and the reaction engine, all configured
//! from [`ThermoSettings`]. One call of [`ThermoData::calculate`] runs a whole
//! request:
//!
//! 1. validation of the request and construction of the temperature grid;
//! 2. resolution of every compound on the worker pool (query, filter, ranges);
//! 3. Cp, H, S, G series of every resolved compound on the grid;
//! 4. reaction ΔH, ΔS, ΔG, K when the request carries an equation.
//!
//! Compounds that are not found are listed in `missing_compounds` and the rest
//! of the request goes on; the request fails with `NotFound` only when nothing
//! resolves.
//!
//! ```rust,no_run
//! use ThermoReact::Thermodynamics::ChemReaction::reaction_request::ReactionRequest;
//! use ThermoReact::Thermodynamics::thermo_lib_api::ThermoData;
//! use ThermoReact::settings::ThermoSettings;
//!
//! let thermo = ThermoData::from_settings(ThermoSettings::default());
//! let request = ReactionRequest::new(&["Zn", "S", "ZnS"], [298.0, 1000.0])
//!     .with_equation("Zn + S -> ZnS");
//! let result = thermo.calculate(&request).unwrap();
//! result.pretty_print();
//! ```
use crate::Thermodynamics::ChemReaction::reaction_engine::ReactionEngine;
use crate::Thermodynamics::ChemReaction::reaction_output::{
    AggregatedReactionData, CompoundSelection, SegmentSummary,
};
use crate::Thermodynamics::ChemReaction::reaction_request::{CompoundSpec, ReactionRequest};
use crate::Thermodynamics::CompoundSearch::compound_resolver::{
    CompoundResolution, CompoundResolver,
};
use crate::Thermodynamics::CompoundSearch::filter_pipeline::{Deadline, FilterPipeline};
use crate::Thermodynamics::CompoundSearch::record_range_builder::{
    RangeSelection, TemperatureSegment,
};
use crate::Thermodynamics::DBhandlers::compound_record::Phase;
use crate::Thermodynamics::DBhandlers::formula_variants::normalize_formula;
use crate::Thermodynamics::DBhandlers::query_builder::QueryBuilder;
use crate::Thermodynamics::DBhandlers::record_store::{CompoundRecordStore, StoreBackend};
use crate::Thermodynamics::thermo_engine::ThermodynamicEngine;
use crate::Thermodynamics::thermo_errors::{ThermoError, ThermoWarning, WarningKind, WarningLog};
use crate::Utils::load_from_file::load_reaction_request;
use crate::settings::ThermoSettings;
use log::{error, info};
use std::collections::HashMap;
use std::path::Path;

pub struct ThermoData<S = StoreBackend> {
    resolver: CompoundResolver<S>,
    reaction_engine: ReactionEngine,
    settings: ThermoSettings,
}

impl ThermoData<StoreBackend> {
    /// dataset file behind retries and the LRU cache, loaded on first search
    pub fn from_settings(settings: ThermoSettings) -> Self {
        let store = StoreBackend::from_dataset_file(
            &settings.dataset_path,
            settings.retry_attempts,
            settings.retry_backoff(),
            settings.cache_capacity,
        );
        Self::with_store(store, settings)
    }
}

impl<S: CompoundRecordStore + Sync> ThermoData<S> {
    pub fn with_store(store: S, settings: ThermoSettings) -> Self {
        let pipeline = FilterPipeline::new(
            QueryBuilder::new(settings.query_row_cap),
            settings.candidate_cap,
        );
        let resolver = CompoundResolver::new(store, pipeline, settings.max_concurrency);
        let reaction_engine = ReactionEngine::new(
            ThermodynamicEngine::new(settings.integration_method),
            settings.max_extrapolation_k,
        );
        Self {
            resolver,
            reaction_engine,
            settings,
        }
    }

    pub fn settings(&self) -> &ThermoSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        self.resolver.store()
    }

    /// Segments of one compound over `[t_start, t_end]`, with the warnings of
    /// the range selection. `NotFound` when no record matches.
    pub fn segments_for(
        &self,
        formula: &str,
        phase: Option<Phase>,
        t_range: (f64, f64),
    ) -> Result<RangeSelection, ThermoError> {
        let spec = CompoundSpec {
            name: formula.trim().to_string(),
            key: normalize_formula(formula),
            phase_hint: phase,
        };
        let deadline = self.settings.request_timeout().map(Deadline::after);
        let resolution = self.resolver.resolve_one(&spec, t_range, deadline.as_ref())?;
        Ok(resolution.selection)
    }

    /// request read from a JSON file, then [`ThermoData::calculate`]
    pub fn calculate_from_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<AggregatedReactionData, ThermoError> {
        let request = load_reaction_request(path)?;
        self.calculate(&request)
    }

    pub fn calculate(&self, request: &ReactionRequest) -> Result<AggregatedReactionData, ThermoError> {
        let validated = request
            .validate(self.settings.default_temperature_step)
            .inspect_err(|e| error!("rejected request: {}", e))?;
        info!(
            "request: {} compound(s), {} temperature(s) in [{}, {}] K",
            validated.compounds.len(),
            validated.grid.len(),
            validated.t_range.0,
            validated.t_range.1
        );
        let deadline = self.settings.request_timeout().map(Deadline::after);
        let results =
            self.resolver
                .resolve_all(&validated.compounds, validated.t_range, deadline.as_ref())?;

        let mut warnings = WarningLog::new();
        let mut missing_compounds = Vec::new();
        let mut selections = Vec::with_capacity(results.len());
        let mut resolved: Vec<(&CompoundSpec, Vec<TemperatureSegment>)> = Vec::new();
        for (spec, result) in validated.compounds.iter().zip(results) {
            match result {
                Ok(CompoundResolution {
                    outcome, selection, ..
                }) => {
                    warnings.extend(selection.warnings);
                    selections.push(CompoundSelection {
                        formula: spec.key.clone(),
                        found: true,
                        rows_fetched: outcome.rows_fetched,
                        candidate_count: outcome.candidates.len(),
                        statistics: outcome.statistics,
                        segments: selection.segments.iter().map(SegmentSummary::from).collect(),
                        split_points: selection.split_points,
                    });
                    resolved.push((spec, selection.segments));
                }
                Err(ThermoError::NotFound { .. }) => {
                    warnings.push(ThermoWarning::new(
                        Some(&spec.key),
                        WarningKind::NotFound,
                        format!("no record found for '{}'", spec.name),
                    ));
                    missing_compounds.push(spec.name.clone());
                    selections.push(CompoundSelection {
                        formula: spec.key.clone(),
                        found: false,
                        rows_fetched: 0,
                        candidate_count: 0,
                        statistics: Vec::new(),
                        segments: Vec::new(),
                        split_points: Vec::new(),
                    });
                }
                Err(e) => {
                    error!("{}: {}", spec.name, e);
                    return Err(e);
                }
            }
        }
        if resolved.is_empty() {
            return Err(ThermoError::NotFound {
                missing: missing_compounds,
            });
        }

        let mut compounds = Vec::with_capacity(resolved.len());
        for (spec, segments) in &resolved {
            compounds.push(self.reaction_engine.compound_series(
                &spec.key,
                segments,
                &validated.grid,
                &mut warnings,
            )?);
        }

        let reaction_points = match &validated.participants {
            Some(participants) => {
                let segments_by_compound: HashMap<String, Vec<TemperatureSegment>> = resolved
                    .into_iter()
                    .map(|(spec, segments)| (spec.key.clone(), segments))
                    .collect();
                self.reaction_engine.aggregate(
                    participants,
                    &segments_by_compound,
                    &validated.grid,
                    &mut warnings,
                )?
            }
            None => Vec::new(),
        };

        let warnings = warnings.into_vec();
        info!(
            "done: {} series, {} reaction point(s), {} warning(s), missing {:?}",
            compounds.len(),
            reaction_points.len(),
            warnings.len(),
            missing_compounds
        );
        Ok(AggregatedReactionData {
            equation: validated.equation,
            temperatures: validated.grid,
            reaction_points,
            compounds,
            selections,
            warnings,
            missing_compounds,
            properties: validated.properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thermodynamics::CompoundSearch::record_range_builder::SegmentSource;
    use crate::Thermodynamics::DBhandlers::compound_record::tests::record;
    use crate::Thermodynamics::DBhandlers::record_store::InMemoryStore;
    use crate::Thermodynamics::thermo_errors::{RequestError, ThermoEngineError};
    use approx::assert_relative_eq;

    fn thermo() -> ThermoData<InMemoryStore> {
        let mut zn = record(1, "Zn", Phase::Solid, Some(298.15), Some(692.73));
        zn.h298 = 0.0;
        zn.s298 = 41.63;
        let mut s = record(2, "S", Phase::Solid, Some(298.15), Some(388.36));
        s.h298 = 0.0;
        s.s298 = 32.05;
        let mut zns = record(3, "ZnS", Phase::Solid, Some(298.15), Some(1293.0));
        zns.h298 = -205.98;
        zns.s298 = 57.66;
        let store = InMemoryStore::new(vec![zn, s, zns]);
        ThermoData::with_store(store, ThermoSettings::default())
    }

    #[test]
    fn test_property_query_has_no_reaction_points() {
        let request = ReactionRequest::new(&["Zn"], [300.0, 500.0]);
        let data = thermo().calculate(&request).unwrap();
        assert_eq!(data.temperatures, vec![300.0, 400.0, 500.0]);
        assert!(data.reaction_points.is_empty());
        assert_eq!(data.compounds.len(), 1);
        assert_eq!(data.compounds[0].points.len(), 3);
        assert!(data.compounds[0].points.iter().all(|p| p.in_range));
        assert!(data.selection("Zn").unwrap().found);
    }

    #[test]
    fn test_reaction_at_reference_temperature() {
        let request = ReactionRequest::new(&["Zn", "S"], [298.15, 298.15])
            .with_equation("Zn + S -> ZnS");
        let data = thermo().calculate(&request).unwrap();
        assert_eq!(data.compounds.len(), 3);
        let p = &data.reaction_points[0];
        assert_relative_eq!(p.dH.unwrap(), -205.98, max_relative = 1e-9);
        assert_relative_eq!(p.dS.unwrap(), 57.66 - 41.63 - 32.05, max_relative = 1e-9);
        assert_eq!(p.confidence, 1.0);
        assert!(p.K.unwrap() > 1.0);
    }

    #[test]
    fn test_missing_compound_is_reported() {
        let request = ReactionRequest::new(&["Zn", "Xyz123"], [300.0, 300.0]);
        let data = thermo().calculate(&request).unwrap();
        assert_eq!(data.missing_compounds, vec!["Xyz123".to_string()]);
        assert!(!data.selection("Xyz123").unwrap().found);
        assert!(data.warnings.iter().any(|w| w.kind == WarningKind::NotFound));
        assert_eq!(data.compounds.len(), 1);
    }

    #[test]
    fn test_nothing_resolved_is_fatal() {
        let request = ReactionRequest::new(&["Xyz123"], [300.0, 400.0]);
        match thermo().calculate(&request) {
            Err(ThermoError::NotFound { missing }) => assert_eq!(missing, vec!["Xyz123"]),
            other => panic!("expected NotFound, got {:?}", other.map(|d| d.compounds)),
        }
    }

    #[test]
    fn test_invalid_request() {
        let request = ReactionRequest::new(&["Zn"], [500.0, 300.0]);
        assert!(matches!(
            thermo().calculate(&request),
            Err(ThermoError::InvalidRequest(RequestError::TemperatureRange(_, _)))
        ));
    }

    #[test]
    fn test_overflowing_record_is_fatal() {
        let mut bad = record(9, "ZnO", Phase::Solid, Some(298.15), Some(1000.0));
        bad.f1 = f64::MAX;
        let data = ThermoData::with_store(InMemoryStore::new(vec![bad]), ThermoSettings::default());
        let request = ReactionRequest::new(&["ZnO"], [500.0, 500.0]);
        assert!(matches!(
            data.calculate(&request),
            Err(ThermoError::NumericalIntegration(ThermoEngineError::NonFinite {
                record_id: 9,
                ..
            }))
        ));
    }

    #[test]
    fn test_segments_for_one_compound() {
        let selection = thermo()
            .segments_for("ZnS", Some(Phase::Solid), (400.0, 900.0))
            .unwrap();
        assert_eq!(selection.segments.len(), 1);
        assert_eq!(selection.segments[0].source, SegmentSource::Direct);
        assert!(matches!(
            thermo().segments_for("Xyz123", None, (400.0, 900.0)),
            Err(ThermoError::NotFound { .. })
        ));
    }
}

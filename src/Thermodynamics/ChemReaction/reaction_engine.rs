//! # Reaction quantities over a temperature grid
//!
//! For every temperature of the grid each participant is evaluated on the
//! segment responsible for that temperature and summed with its signed
//! coefficient:
//!
//! ΔX = Σ ν·X(products) − Σ ν·X(reactants),  K = exp(−ΔG/(R·T))
//!
//! A participant without data at T is left out of that point and lowers its
//! confidence. Temperatures slightly outside the outermost segments are
//! evaluated on the nearest edge segment and flagged as extrapolated.
use crate::Thermodynamics::ChemReaction::equation_parser::ReactionParticipant;
use crate::Thermodynamics::ChemReaction::reaction_output::CompoundSeries;
use crate::Thermodynamics::CompoundSearch::record_range_builder::{
    TemperatureSegment, find_segment,
};
use crate::Thermodynamics::thermo_engine::{R, ThermoPoint, ThermodynamicEngine};
use crate::Thermodynamics::thermo_errors::{
    ThermoEngineError, ThermoError, ThermoWarning, WarningKind, WarningLog,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// default distance beyond the outermost segments that is still extrapolated, K
pub const DEFAULT_MAX_EXTRAPOLATION_K: f64 = 50.0;

/// reaction quantities at one temperature; None where no participant resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionPoint {
    pub T: f64,
    /// kJ/mol
    pub dH: Option<f64>,
    /// J/mol/K
    pub dS: Option<f64>,
    /// kJ/mol
    pub dG: Option<f64>,
    /// None as well when exp overflows or underflows; log10_K is still given then
    pub K: Option<f64>,
    pub log10_K: Option<f64>,
    /// fraction of participants evaluated at T
    pub confidence: f64,
    /// at least one participant was extrapolated
    pub extrapolated: bool,
    /// participants without data at T
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReactionEngine {
    pub engine: ThermodynamicEngine,
    pub max_extrapolation_k: f64,
}

impl Default for ReactionEngine {
    fn default() -> Self {
        Self::new(ThermodynamicEngine::default(), DEFAULT_MAX_EXTRAPOLATION_K)
    }
}

impl ReactionEngine {
    pub fn new(engine: ThermodynamicEngine, max_extrapolation_k: f64) -> Self {
        Self {
            engine,
            max_extrapolation_k: max_extrapolation_k.max(0.0),
        }
    }

    /// State of one compound at T and whether it was extrapolated.
    /// None with a warning when there is no data at T.
    pub fn point_at(
        &self,
        formula: &str,
        segments: &[TemperatureSegment],
        T: f64,
        warnings: &mut WarningLog,
    ) -> Result<Option<(ThermoPoint, bool)>, ThermoEngineError> {
        if let Some(segment) = find_segment(segments, T) {
            return Ok(Some((self.engine.evaluate(segment, T)?, false)));
        }
        let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
            return Ok(None);
        };
        let edge = if T < first.t_low && first.t_low - T <= self.max_extrapolation_k {
            Some(first)
        } else if T > last.t_high && T - last.t_high <= self.max_extrapolation_k {
            Some(last)
        } else {
            None
        };
        match edge {
            Some(segment) => {
                let point = self.engine.evaluate(segment, T)?;
                warnings.push(
                    ThermoWarning::new(
                        Some(formula),
                        WarningKind::Extrapolation,
                        format!(
                            "extrapolated outside {}..{} K with record {}",
                            first.t_low, last.t_high, segment.record.id
                        ),
                    )
                    .at(T),
                );
                Ok(Some((point, true)))
            }
            None => {
                warnings.push(
                    ThermoWarning::new(
                        Some(formula),
                        WarningKind::TemperatureOutOfRange,
                        "no data at the requested temperature",
                    )
                    .at(T),
                );
                Ok(None)
            }
        }
    }

    /// Cp, H, S, G of one compound at every grid temperature it has data for
    pub fn compound_series(
        &self,
        formula: &str,
        segments: &[TemperatureSegment],
        grid: &[f64],
        warnings: &mut WarningLog,
    ) -> Result<CompoundSeries, ThermoEngineError> {
        let mut series = CompoundSeries {
            formula: formula.to_string(),
            points: Vec::with_capacity(grid.len()),
            missing_temperatures: Vec::new(),
        };
        for &T in grid {
            match self.point_at(formula, segments, T, warnings)? {
                Some((point, _)) => series.points.push(point),
                None => series.missing_temperatures.push(T),
            }
        }
        Ok(series)
    }

    /// Reaction point per grid temperature, in grid order.
    /// Fails when not a single participant can be evaluated anywhere on the grid.
    pub fn aggregate(
        &self,
        participants: &[ReactionParticipant],
        segments_by_compound: &HashMap<String, Vec<TemperatureSegment>>,
        grid: &[f64],
        warnings: &mut WarningLog,
    ) -> Result<Vec<ReactionPoint>, ThermoError> {
        let no_segments: Vec<TemperatureSegment> = Vec::new();
        let mut points = Vec::with_capacity(grid.len());
        for &T in grid {
            let (mut dH, mut dS, mut dG) = (0.0, 0.0, 0.0);
            let mut resolved = 0usize;
            let mut extrapolated = false;
            let mut missing = Vec::new();
            for p in participants {
                let segments = segments_by_compound
                    .get(&p.formula)
                    .unwrap_or(&no_segments);
                match self.point_at(&p.formula, segments, T, warnings)? {
                    Some((point, ext)) => {
                        let nu = p.signed_coefficient();
                        dH += nu * point.H;
                        dS += nu * point.S;
                        dG += nu * point.G;
                        resolved += 1;
                        extrapolated |= ext;
                    }
                    None => missing.push(p.formula.clone()),
                }
            }
            let confidence = if participants.is_empty() {
                0.0
            } else {
                resolved as f64 / participants.len() as f64
            };
            let point = if resolved == 0 {
                ReactionPoint {
                    T,
                    dH: None,
                    dS: None,
                    dG: None,
                    K: None,
                    log10_K: None,
                    confidence,
                    extrapolated,
                    missing,
                }
            } else {
                // dG in J/mol here
                let ln_K = -dG / (R * T);
                let K = ln_K.exp();
                ReactionPoint {
                    T,
                    dH: Some(dH / 1000.0),
                    dS: Some(dS),
                    dG: Some(dG / 1000.0),
                    K: (K.is_finite() && K > 0.0).then_some(K),
                    log10_K: Some(ln_K / std::f64::consts::LN_10),
                    confidence,
                    extrapolated,
                    missing,
                }
            };
            debug!(
                "T = {} K: dG = {:?} kJ/mol, confidence {:.2}",
                T, point.dG, point.confidence
            );
            points.push(point);
        }

        if !participants.is_empty() && points.iter().all(|p| p.dG.is_none()) {
            let with_data: Vec<&ReactionParticipant> = participants
                .iter()
                .filter(|p| {
                    segments_by_compound
                        .get(&p.formula)
                        .is_some_and(|s| !s.is_empty())
                })
                .collect();
            return Err(match with_data.first() {
                None => ThermoError::NotFound {
                    missing: participants.iter().map(|p| p.formula.clone()).collect(),
                },
                Some(p) => ThermoError::TemperatureOutOfRange {
                    formula: p.formula.clone(),
                    temperature: grid.first().copied().unwrap_or(f64::NAN),
                },
            });
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thermodynamics::ChemReaction::equation_parser::{Role, parse_equation};
    use crate::Thermodynamics::CompoundSearch::record_range_builder::SegmentSource;
    use crate::Thermodynamics::DBhandlers::compound_record::tests::record;
    use crate::Thermodynamics::DBhandlers::compound_record::{CompoundRecord, Phase};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn segment(r: CompoundRecord) -> TemperatureSegment {
        TemperatureSegment {
            t_low: r.lower(),
            t_high: r.upper(),
            record: Arc::new(r),
            source: SegmentSource::Direct,
        }
    }

    fn zn_s_zns() -> HashMap<String, Vec<TemperatureSegment>> {
        let mut zn = record(1, "Zn", Phase::Solid, Some(298.15), Some(692.73));
        zn.h298 = 0.0;
        zn.s298 = 41.63;
        zn.f1 = 20.74;
        zn.f2 = 12.51;
        zn.f3 = 0.0;
        let mut s = record(2, "S", Phase::Solid, Some(298.15), Some(388.36));
        s.h298 = 0.0;
        s.s298 = 32.07;
        s.f1 = 14.98;
        s.f2 = 26.11;
        s.f3 = 0.0;
        let mut zns = record(3, "ZnS", Phase::Solid, Some(298.15), Some(1293.0));
        zns.h298 = -205.98;
        zns.s298 = 57.7;
        zns.f1 = 50.88;
        zns.f2 = 5.19;
        zns.f3 = -5.69;
        HashMap::from([
            ("Zn".to_string(), vec![segment(zn)]),
            ("S".to_string(), vec![segment(s)]),
            ("ZnS".to_string(), vec![segment(zns)]),
        ])
    }

    #[test]
    fn test_zn_s_reaction_at_reference_temperature() {
        let participants = parse_equation("Zn + S -> ZnS").unwrap();
        let mut warnings = WarningLog::new();
        let points = ReactionEngine::default()
            .aggregate(&participants, &zn_s_zns(), &[298.15], &mut warnings)
            .unwrap();
        let p = &points[0];
        assert_relative_eq!(p.dH.unwrap(), -205.98, max_relative = 1e-9);
        assert_relative_eq!(p.dS.unwrap(), 57.7 - 41.63 - 32.07, max_relative = 1e-9);
        let dG = -205.98 - 298.15 * (57.7 - 41.63 - 32.07) / 1000.0;
        assert_relative_eq!(p.dG.unwrap(), dG, max_relative = 1e-9);
        assert_relative_eq!(
            p.K.unwrap().ln(),
            -dG * 1000.0 / (R * 298.15),
            max_relative = 1e-9
        );
        assert_eq!(p.confidence, 1.0);
        assert!(!p.extrapolated);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_extrapolation_and_missing_at_t() {
        let participants = parse_equation("Zn + S -> ZnS").unwrap();
        let mut warnings = WarningLog::new();
        let grid = [298.0, 400.0, 600.0];
        let points = ReactionEngine::default()
            .aggregate(&participants, &zn_s_zns(), &grid, &mut warnings)
            .unwrap();
        // 298 K lies 0.15 K below every record
        assert!(points[0].extrapolated);
        assert_eq!(points[0].confidence, 1.0);
        // S has no data above 388.36 + 50 K
        assert!(points[1].extrapolated);
        assert_eq!(points[2].missing, vec!["S".to_string()]);
        assert_relative_eq!(points[2].confidence, 2.0 / 3.0);
        assert!(points[2].dG.is_some());
        let kinds: Vec<WarningKind> = warnings.into_vec().iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&WarningKind::Extrapolation));
        assert!(kinds.contains(&WarningKind::TemperatureOutOfRange));
    }

    #[test]
    fn test_identity_reaction() {
        let participants = parse_equation("ZnS -> ZnS").unwrap();
        let mut warnings = WarningLog::new();
        let points = ReactionEngine::default()
            .aggregate(&participants, &zn_s_zns(), &[300.0, 700.0, 1200.0], &mut warnings)
            .unwrap();
        for p in points {
            assert_eq!(p.dH, Some(0.0));
            assert_eq!(p.dS, Some(0.0));
            assert_eq!(p.dG, Some(0.0));
            assert_eq!(p.K, Some(1.0));
        }
    }

    #[test]
    fn test_nothing_resolvable_is_fatal() {
        let participants = vec![
            ReactionParticipant::new("Xyz123", 1.0, Role::Reactant).unwrap(),
            ReactionParticipant::new("Abc", 1.0, Role::Product).unwrap(),
        ];
        let mut warnings = WarningLog::new();
        let err = ReactionEngine::default()
            .aggregate(&participants, &HashMap::new(), &[300.0], &mut warnings)
            .unwrap_err();
        assert!(matches!(err, ThermoError::NotFound { missing } if missing.len() == 2));

        let participants = parse_equation("Zn + S -> ZnS").unwrap();
        let err = ReactionEngine::default()
            .aggregate(&participants, &zn_s_zns(), &[3000.0], &mut warnings)
            .unwrap_err();
        assert!(matches!(err, ThermoError::TemperatureOutOfRange { .. }));
    }

    #[test]
    fn test_compound_series() {
        let segments = zn_s_zns();
        let mut warnings = WarningLog::new();
        let series = ReactionEngine::default()
            .compound_series("S", &segments["S"], &[300.0, 350.0, 500.0], &mut warnings)
            .unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.missing_temperatures, vec![500.0]);
        assert!(series.points.iter().all(|p| p.in_range));
    }
}

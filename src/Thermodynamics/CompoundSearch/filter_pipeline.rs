//! # Six-stage candidate filter for one compound
//!
//! 1. formula variants - rows of the exact, prefixed and ionic forms, tagged
//! 2. temperature admissibility - rows whose bounded range misses the request are dropped
//! 3. phase resolution - scored against the hint, or the phase the record's own
//!    transition points predict at the target temperature; nothing is dropped
//! 4. reliability weighting - re-rank by (phase score, reliability)
//! 5. complex search - relaxed formula matching, only when 1-4 left nothing for a
//!    multi-atom formula; stages 2-4 run again on the new rows
//! 6. final ranking - stable sort and cap
//!
//! Every stage leaves a [`StageStatistics`] entry behind.
use crate::Thermodynamics::DBhandlers::compound_record::{
    CompoundRecord, Phase, phase_by_transitions,
};
use crate::Thermodynamics::DBhandlers::formula_variants::{MatchVariant, is_multi_atom};
use crate::Thermodynamics::DBhandlers::query_builder::{
    CompoundQuery, MatchedRecord, QueryBuilder, tmin_distance,
};
use crate::Thermodynamics::DBhandlers::record_store::CompoundRecordStore;
use crate::Thermodynamics::thermo_errors::ThermoError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// default number of candidates kept after the final ranking
pub const DEFAULT_CANDIDATE_CAP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterStage {
    FormulaVariants = 1,
    TemperatureAdmissibility = 2,
    PhaseResolution = 3,
    ReliabilityWeighting = 4,
    ComplexSearch = 5,
    FinalRanking = 6,
}

/// agreement of a candidate's phase with the expected one; lower is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhaseMatch {
    Expected,
    Unknown,
    Mismatch,
}

/// how a candidate's range relates to the request; lower is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemperatureFit {
    /// covers the whole requested range
    Full,
    /// covers the target temperature only
    ContainsTarget,
    /// intersects the requested range
    Partial,
}

#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub record: Arc<CompoundRecord>,
    pub variant: MatchVariant,
    /// at least one bound of the record is null
    pub unbounded: bool,
    pub phase_score: PhaseMatch,
    pub temperature_fit: TemperatureFit,
    /// position after the latest ranking, 0 is best
    pub rank: usize,
    /// stage the candidate entered the pipeline at
    pub found_by: FilterStage,
    /// ids of the dataset rows behind the record, more than one for merged records
    pub merged_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatistics {
    pub stage: FilterStage,
    pub count_in: usize,
    pub count_out: usize,
    pub note: Option<String>,
}

/// point in time after which resolution is abandoned
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    pub at: Instant,
    pub timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn check(deadline: Option<&Deadline>) -> Result<(), ThermoError> {
        match deadline {
            Some(d) if Instant::now() >= d.at => Err(ThermoError::RequestTimeout(d.timeout)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub query: CompoundQuery,
    /// ranked survivors, empty when the compound was not found
    pub candidates: Vec<SearchCandidate>,
    pub statistics: Vec<StageStatistics>,
    /// rows returned by the store before any filtering
    pub rows_fetched: usize,
}

#[derive(Debug, Clone)]
pub struct FilterPipeline {
    pub query_builder: QueryBuilder,
    pub candidate_cap: usize,
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new(QueryBuilder::default(), DEFAULT_CANDIDATE_CAP)
    }
}

impl FilterPipeline {
    pub fn new(query_builder: QueryBuilder, candidate_cap: usize) -> Self {
        Self {
            query_builder,
            candidate_cap: candidate_cap.max(1),
        }
    }

    /// Runs the six stages for one compound over the requested range.
    /// The target temperature of the ranking is the start of the range.
    /// Only store failures and an expired deadline are errors.
    pub fn run<S: CompoundRecordStore>(
        &self,
        store: &S,
        formula: &str,
        phase_hint: Option<Phase>,
        t_range: (f64, f64),
        deadline: Option<&Deadline>,
    ) -> Result<PipelineOutcome, ThermoError> {
        let query = self.query_builder.build(formula, phase_hint, Some(t_range.0));
        let mut statistics = Vec::with_capacity(6);

        // 1
        let rows = self.query_builder.search(store, &query)?;
        let mut rows_fetched = rows.len();
        statistics.push(StageStatistics {
            stage: FilterStage::FormulaVariants,
            count_in: rows.len(),
            count_out: rows.len(),
            note: Some(variant_note(&rows)),
        });
        let mut seen_keys: HashSet<String> = rows.iter().map(|m| dedup_key(&m.record)).collect();
        let candidates = rows
            .into_iter()
            .map(|m| to_candidate(m, FilterStage::FormulaVariants))
            .collect();
        Deadline::check(deadline)?;

        // 2-4
        let mut candidates =
            self.admissibility_phase_reliability(candidates, &query, t_range, &mut statistics);
        Deadline::check(deadline)?;

        // 5
        if candidates.is_empty() && is_multi_atom(&query.formula) {
            let relaxed = self.query_builder.search_relaxed(store, &query)?;
            let count_in = relaxed.len();
            let fresh: Vec<SearchCandidate> = relaxed
                .into_iter()
                .filter(|m| seen_keys.insert(dedup_key(&m.record)))
                .map(|m| to_candidate(m, FilterStage::ComplexSearch))
                .collect();
            rows_fetched += fresh.len();
            statistics.push(StageStatistics {
                stage: FilterStage::ComplexSearch,
                count_in,
                count_out: fresh.len(),
                note: Some("relaxed formula match, deduplicated by CAS".to_string()),
            });
            debug!(
                "{}: complex search found {} new rows",
                query.formula,
                fresh.len()
            );
            candidates =
                self.admissibility_phase_reliability(fresh, &query, t_range, &mut statistics);
            Deadline::check(deadline)?;
        } else {
            statistics.push(StageStatistics {
                stage: FilterStage::ComplexSearch,
                count_in: candidates.len(),
                count_out: candidates.len(),
                note: Some("skipped".to_string()),
            });
        }

        // 6
        let count_in = candidates.len();
        candidates.sort_by(|a, b| {
            a.phase_score
                .cmp(&b.phase_score)
                .then_with(|| a.temperature_fit.cmp(&b.temperature_fit))
                .then_with(|| a.record.reliability_class.cmp(&b.record.reliability_class))
                .then_with(|| {
                    tmin_distance(&a.record, query.target_temperature)
                        .total_cmp(&tmin_distance(&b.record, query.target_temperature))
                })
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        candidates.truncate(self.candidate_cap);
        for (i, c) in candidates.iter_mut().enumerate() {
            c.rank = i;
        }
        statistics.push(StageStatistics {
            stage: FilterStage::FinalRanking,
            count_in,
            count_out: candidates.len(),
            note: (count_in > candidates.len()).then(|| format!("capped at {}", self.candidate_cap)),
        });
        for s in &statistics {
            debug!(
                "{}: stage {:?}: {} -> {}",
                query.formula, s.stage, s.count_in, s.count_out
            );
        }
        Ok(PipelineOutcome {
            query,
            candidates,
            statistics,
            rows_fetched,
        })
    }

    /// stages 2, 3 and 4
    fn admissibility_phase_reliability(
        &self,
        candidates: Vec<SearchCandidate>,
        query: &CompoundQuery,
        (t_start, t_end): (f64, f64),
        statistics: &mut Vec<StageStatistics>,
    ) -> Vec<SearchCandidate> {
        // 2
        let count_in = candidates.len();
        let mut admitted: Vec<SearchCandidate> = candidates
            .into_iter()
            // a row with an open bound is never dropped here
            .filter(|c| c.unbounded || c.record.intersects(t_start, t_end))
            .map(|mut c| {
                c.temperature_fit = if c.record.covers_range(t_start, t_end) {
                    TemperatureFit::Full
                } else if c.record.covers(t_start) {
                    TemperatureFit::ContainsTarget
                } else {
                    TemperatureFit::Partial
                };
                c
            })
            .collect();
        let unbounded = admitted.iter().filter(|c| c.unbounded).count();
        statistics.push(StageStatistics {
            stage: FilterStage::TemperatureAdmissibility,
            count_in,
            count_out: admitted.len(),
            note: Some(format!(
                "{} outside [{}, {}] K, {} unbounded",
                count_in - admitted.len(),
                t_start,
                t_end,
                unbounded
            )),
        });

        // 3
        let hint_matches = query
            .phase_hint
            .is_some_and(|hint| admitted.iter().any(|c| c.record.phase == hint));
        for c in admitted.iter_mut() {
            c.phase_score = match query.phase_hint {
                Some(hint) if hint_matches => {
                    if c.record.phase == hint {
                        PhaseMatch::Expected
                    } else {
                        PhaseMatch::Mismatch
                    }
                }
                _ => match phase_by_transitions(c.record.t_melt, c.record.t_boil, t_start) {
                    Some(p) if p == c.record.phase => PhaseMatch::Expected,
                    Some(_) => PhaseMatch::Mismatch,
                    None => PhaseMatch::Unknown,
                },
            };
        }
        let expected = admitted
            .iter()
            .filter(|c| c.phase_score == PhaseMatch::Expected)
            .count();
        statistics.push(StageStatistics {
            stage: FilterStage::PhaseResolution,
            count_in: admitted.len(),
            count_out: admitted.len(),
            note: Some(if hint_matches {
                format!("{} match the phase hint", expected)
            } else {
                format!("{} match the phase inferred at {} K", expected, t_start)
            }),
        });

        // 4
        admitted.sort_by(|a, b| {
            a.phase_score
                .cmp(&b.phase_score)
                .then_with(|| a.record.reliability_class.cmp(&b.record.reliability_class))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        for (i, c) in admitted.iter_mut().enumerate() {
            c.rank = i;
        }
        statistics.push(StageStatistics {
            stage: FilterStage::ReliabilityWeighting,
            count_in: admitted.len(),
            count_out: admitted.len(),
            note: None,
        });
        admitted
    }
}

fn to_candidate(m: MatchedRecord, found_by: FilterStage) -> SearchCandidate {
    SearchCandidate {
        unbounded: m.record.is_unbounded(),
        merged_ids: vec![m.record.id],
        record: m.record,
        variant: m.variant,
        phase_score: PhaseMatch::Unknown,
        temperature_fit: TemperatureFit::Partial,
        rank: 0,
        found_by,
    }
}

/// CAS number, or the row id for rows without one
fn dedup_key(record: &CompoundRecord) -> String {
    match &record.cas {
        Some(cas) if !cas.trim().is_empty() => format!("cas:{}", cas.trim()),
        _ => format!("id:{}", record.id),
    }
}

fn variant_note(rows: &[MatchedRecord]) -> String {
    let count = |v: MatchVariant| rows.iter().filter(|m| m.variant == v).count();
    format!(
        "exact {}, prefix {}, ionic {}",
        count(MatchVariant::Exact),
        count(MatchVariant::Prefix),
        count(MatchVariant::Ionic)
    )
}

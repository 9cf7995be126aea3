//! # From ranked candidates to temperature segments
//!
//! The requested range is covered by a sweep from its start to its end, the
//! cursor moving from one segment end to the next:
//!
//! - tier 1: candidates with identical data (same phase, H298, S298, f1..f6)
//!   whose ranges touch or overlap become one virtual record spanning the union
//! - tier 2: the range is split at the melting and boiling points; in each
//!   piece the best-ranked record of the phase physics demands there is taken,
//!   chained with further records of that phase if one does not reach the end
//! - tier 3: where no record of that phase exists the record with the widest
//!   overlap is taken regardless of phase and an `AmbiguousPhase` warning is left
//!
//! What is still uncovered becomes a `CoverageGap` warning and no segment.
use crate::Thermodynamics::CompoundSearch::filter_pipeline::SearchCandidate;
use crate::Thermodynamics::DBhandlers::compound_record::{
    CompoundRecord, Phase, phase_by_transitions,
};
use crate::Thermodynamics::thermo_errors::{ThermoWarning, WarningKind};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// how the record of a segment was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentSource {
    Direct,
    /// virtual record built from several rows with identical data
    Merged { record_ids: Vec<u64> },
    /// no record of the expected phase covered the piece
    PhaseUncertain,
}

/// `[t_low, t_high]` evaluated with one record; the record covers the whole segment
#[derive(Debug, Clone)]
pub struct TemperatureSegment {
    pub t_low: f64,
    pub t_high: f64,
    pub record: Arc<CompoundRecord>,
    pub source: SegmentSource,
}

impl TemperatureSegment {
    pub fn contains(&self, t: f64) -> bool {
        self.t_low <= t && t <= self.t_high
    }
}

/// Segment responsible for temperature t: `t_low <= t < t_high`, the upper end
/// belonging to a segment only when no segment starts there.
pub fn find_segment(segments: &[TemperatureSegment], t: f64) -> Option<&TemperatureSegment> {
    segments.iter().enumerate().find_map(|(i, s)| {
        let closed = match segments.get(i + 1) {
            Some(next) => next.t_low > s.t_high,
            None => true,
        };
        let hit = (s.t_low <= t && t < s.t_high) || (closed && t == s.t_high);
        hit.then_some(s)
    })
}

#[derive(Debug, Clone, Default)]
pub struct RangeSelection {
    /// ordered by t_low, non-overlapping
    pub segments: Vec<TemperatureSegment>,
    pub warnings: Vec<ThermoWarning>,
    /// melting and boiling points the range was split at
    pub split_points: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordRangeBuilder;

impl RecordRangeBuilder {
    pub fn new() -> Self {
        RecordRangeBuilder
    }

    /// candidates are expected in rank order, best first
    pub fn build(
        &self,
        formula: &str,
        candidates: &[SearchCandidate],
        (t_start, t_end): (f64, f64),
        phase_hint: Option<Phase>,
    ) -> RangeSelection {
        let mut selection = RangeSelection::default();
        if candidates.is_empty() {
            return selection;
        }
        let merged = merge_identical(candidates.to_vec());
        if merged.len() < candidates.len() {
            debug!(
                "{}: {} candidates merged into {} records",
                formula,
                candidates.len(),
                merged.len()
            );
        }

        // transition points of the best-ranked candidate that knows any
        let (t_melt, t_boil) = merged
            .iter()
            .find(|c| c.record.t_melt.is_some() || c.record.t_boil.is_some())
            .map(|c| (c.record.t_melt, c.record.t_boil))
            .unwrap_or((None, None));
        let mut boundaries = vec![t_start];
        for t in [t_melt, t_boil].into_iter().flatten() {
            if t_start < t && t < t_end {
                boundaries.push(t);
                selection.split_points.push(t);
            }
        }
        boundaries.push(t_end);
        boundaries.dedup();
        if boundaries.len() == 1 {
            boundaries.push(t_end);
        }

        for piece in boundaries.windows(2) {
            let (lo, hi) = (piece[0], piece[1]);
            // an explicit hint first, then the phase the transition points call for
            let physical = phase_by_transitions(t_melt, t_boil, 0.5 * (lo + hi));
            let phases: Vec<Phase> = match phase_hint {
                Some(hint) => std::iter::once(hint)
                    .chain(physical.filter(|&p| p != hint))
                    .collect(),
                None => vec![physical.unwrap_or(merged[0].record.phase)],
            };
            self.sweep(formula, &merged, lo, hi, &phases, &mut selection);
        }
        selection.segments = coalesce(selection.segments);
        info!(
            "{}: {} segment(s) over [{}, {}] K, split at {:?}",
            formula,
            selection.segments.len(),
            t_start,
            t_end,
            selection.split_points
        );
        selection
    }

    fn sweep(
        &self,
        formula: &str,
        candidates: &[SearchCandidate],
        lo: f64,
        hi: f64,
        phases: &[Phase],
        selection: &mut RangeSelection,
    ) {
        let Some(&preferred) = phases.first() else {
            return;
        };
        let point = lo == hi;
        // a candidate can continue the coverage from the cursor
        let reaches = |c: &SearchCandidate, cursor: f64| {
            let r = &c.record;
            if point {
                r.covers(cursor)
            } else {
                r.lower() <= cursor && cursor < r.upper()
            }
        };
        let mut cursor = lo;
        loop {
            // tier 2; a phase other than the first one is flagged
            let chosen = phases
                .iter()
                .enumerate()
                .find_map(|(i, &phase)| {
                    candidates
                        .iter()
                        .find(|c| c.record.phase == phase && reaches(c, cursor))
                        .map(|c| (c, i > 0))
                })
                // tier 3
                .or_else(|| {
                    candidates
                        .iter()
                        .filter(|c| reaches(c, cursor))
                        .min_by(|a, b| {
                            b.record
                                .overlap(cursor, hi)
                                .total_cmp(&a.record.overlap(cursor, hi))
                                .then_with(|| a.phase_score.cmp(&b.phase_score))
                                .then_with(|| a.rank.cmp(&b.rank))
                        })
                        .map(|c| (c, true))
                });

            match chosen {
                Some((c, uncertain)) => {
                    let t_high = c.record.upper().min(hi);
                    if uncertain {
                        selection.warnings.push(
                            ThermoWarning::new(
                                Some(formula),
                                WarningKind::AmbiguousPhase,
                                format!(
                                    "no {} record covers {}..{} K, {} record {} used",
                                    preferred, cursor, t_high, c.record.phase, c.record.id
                                ),
                            )
                            .at(cursor),
                        );
                    }
                    let source = if uncertain {
                        SegmentSource::PhaseUncertain
                    } else if c.merged_ids.len() > 1 {
                        SegmentSource::Merged {
                            record_ids: c.merged_ids.clone(),
                        }
                    } else {
                        SegmentSource::Direct
                    };
                    selection.segments.push(TemperatureSegment {
                        t_low: cursor,
                        t_high,
                        record: Arc::clone(&c.record),
                        source,
                    });
                    cursor = t_high;
                }
                None => {
                    let next_start = candidates
                        .iter()
                        .map(|c| c.record.lower())
                        .filter(|&t| t > cursor && t < hi)
                        .min_by(f64::total_cmp);
                    let gap_end = next_start.unwrap_or(hi);
                    selection.warnings.push(
                        ThermoWarning::new(
                            Some(formula),
                            WarningKind::CoverageGap,
                            format!("no record covers {}..{} K", cursor, gap_end),
                        )
                        .at(cursor),
                    );
                    match next_start {
                        Some(t) => cursor = t,
                        None => break,
                    }
                }
            }
            if cursor >= hi {
                break;
            }
        }
    }
}

fn touches(a: &CompoundRecord, b: &CompoundRecord) -> bool {
    a.lower() <= b.upper() && b.lower() <= a.upper()
}

/// tier 1; the better-ranked member of a merge keeps its identity
fn merge_identical(mut groups: Vec<SearchCandidate>) -> Vec<SearchCandidate> {
    loop {
        let pair = (0..groups.len()).find_map(|i| {
            (i + 1..groups.len())
                .find(|&j| {
                    groups[i].record.same_data(&groups[j].record)
                        && touches(&groups[i].record, &groups[j].record)
                })
                .map(|j| (i, j))
        });
        let Some((i, j)) = pair else {
            return groups;
        };
        let other = groups.remove(j);
        let keeper = &mut groups[i];
        let mut record = (*keeper.record).clone();
        record.t_min = match (record.t_min, other.record.t_min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        record.t_max = match (record.t_max, other.record.t_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        keeper.unbounded = record.is_unbounded();
        keeper.record = Arc::new(record);
        keeper.rank = keeper.rank.min(other.rank);
        keeper.phase_score = keeper.phase_score.min(other.phase_score);
        keeper.temperature_fit = keeper.temperature_fit.min(other.temperature_fit);
        keeper.merged_ids.extend(other.merged_ids);
        keeper.merged_ids.sort_unstable();
        keeper.merged_ids.dedup();
    }
}

/// joins neighbours evaluated with the same record
fn coalesce(segments: Vec<TemperatureSegment>) -> Vec<TemperatureSegment> {
    let mut out: Vec<TemperatureSegment> = Vec::with_capacity(segments.len());
    for s in segments {
        if let Some(last) = out.last_mut() {
            if last.record.id == s.record.id && last.t_high == s.t_low && last.source == s.source {
                last.t_high = s.t_high;
                continue;
            }
        }
        out.push(s);
    }
    out
}

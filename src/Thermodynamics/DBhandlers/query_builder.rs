//! Ranked search of the record store for one compound.
//!
//! A search asks for the exact formula and the bracket-qualified forms of it
//! (`H2O`, `H2O(g)`, `H2O(l)`). Only when both come back empty are the ionic
//! counterparts tried (`H2SO4` -> `SO4(2-)`, `HSO4(-)`). Rows are ordered, never
//! filtered, here: filtering belongs to the pipeline.
use crate::Thermodynamics::DBhandlers::compound_record::{CompoundRecord, Phase};
use crate::Thermodynamics::DBhandlers::formula_variants::{
    MatchVariant, base_formula, classify_match, ionic_synonyms, normalize_formula,
};
use crate::Thermodynamics::DBhandlers::record_store::{CompoundRecordStore, FormulaPattern};
use crate::Thermodynamics::thermo_errors::StoreError;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// default hard cap of rows returned by one search
pub const DEFAULT_ROW_CAP: usize = 100;

/// normalized query of one compound
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundQuery {
    /// formula as written by the user
    pub raw_formula: String,
    pub formula: String,
    pub synonyms: Vec<String>,
    pub phase_hint: Option<Phase>,
    pub target_temperature: Option<f64>,
}

/// a store row with the variant that matched it
#[derive(Debug, Clone)]
pub struct MatchedRecord {
    pub record: Arc<CompoundRecord>,
    pub variant: MatchVariant,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub row_cap: usize,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_CAP)
    }
}

impl QueryBuilder {
    pub fn new(row_cap: usize) -> Self {
        Self {
            row_cap: row_cap.max(1),
        }
    }

    pub fn build(
        &self,
        formula: &str,
        phase_hint: Option<Phase>,
        target_temperature: Option<f64>,
    ) -> CompoundQuery {
        let normalized = normalize_formula(formula);
        let synonyms = ionic_synonyms(&normalized);
        CompoundQuery {
            raw_formula: formula.to_string(),
            formula: normalized,
            synonyms,
            phase_hint,
            target_temperature,
        }
    }

    /// exact and prefix rows; ionic counterparts only when those are empty
    pub fn search<S: CompoundRecordStore>(
        &self,
        store: &S,
        query: &CompoundQuery,
    ) -> Result<Vec<MatchedRecord>, StoreError> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        for pattern in [
            FormulaPattern::Exact(query.formula.clone()),
            FormulaPattern::Prefix(query.formula.clone()),
        ] {
            let variant = match pattern {
                FormulaPattern::Exact(_) => MatchVariant::Exact,
                _ => MatchVariant::Prefix,
            };
            collect_rows(store.fetch(&pattern)?, variant, &mut seen, &mut found);
        }
        if found.is_empty() {
            for synonym in &query.synonyms {
                for pattern in [
                    FormulaPattern::Exact(synonym.clone()),
                    FormulaPattern::Prefix(synonym.clone()),
                ] {
                    collect_rows(
                        store.fetch(&pattern)?,
                        MatchVariant::Ionic,
                        &mut seen,
                        &mut found,
                    );
                }
            }
        }
        Ok(self.rank_and_cap(found, query))
    }

    /// rows sharing the base formula once trailing qualifiers are stripped
    pub fn search_relaxed<S: CompoundRecordStore>(
        &self,
        store: &S,
        query: &CompoundQuery,
    ) -> Result<Vec<MatchedRecord>, StoreError> {
        let base = base_formula(&query.formula).to_string();
        let rows = store.fetch(&FormulaPattern::Base(base))?;
        let found = rows
            .into_iter()
            .filter_map(|record| {
                classify_match(&record.formula, &query.formula, &query.synonyms)
                    .map(|variant| MatchedRecord { record, variant })
            })
            .collect();
        Ok(self.rank_and_cap(found, query))
    }

    fn rank_and_cap(&self, mut found: Vec<MatchedRecord>, query: &CompoundQuery) -> Vec<MatchedRecord> {
        found.sort_by(|a, b| compare_rows(&a.record, &b.record, query));
        if found.len() > self.row_cap {
            debug!(
                "{}: {} rows capped to {}",
                query.formula,
                found.len(),
                self.row_cap
            );
            found.truncate(self.row_cap);
        }
        found
    }
}

fn collect_rows(
    rows: Vec<Arc<CompoundRecord>>,
    variant: MatchVariant,
    seen: &mut HashSet<u64>,
    found: &mut Vec<MatchedRecord>,
) {
    for record in rows {
        if seen.insert(record.id) {
            found.push(MatchedRecord { record, variant });
        }
    }
}

/// distance of the record's lower bound from the target; unbounded rows are at distance 0
pub(crate) fn tmin_distance(record: &CompoundRecord, target: Option<f64>) -> f64 {
    match (record.t_min, target) {
        (Some(t_min), Some(target)) => (t_min - target).abs(),
        _ => 0.0,
    }
}

/// store ordering: phase match to the hint, containment of the target
/// temperature, reliability, |Tmin - target|, row id
pub fn compare_rows(a: &CompoundRecord, b: &CompoundRecord, query: &CompoundQuery) -> Ordering {
    let phase_miss = |r: &CompoundRecord| query.phase_hint.is_some_and(|hint| hint != r.phase);
    let target_miss = |r: &CompoundRecord| query.target_temperature.is_some_and(|t| !r.covers(t));
    phase_miss(a)
        .cmp(&phase_miss(b))
        .then_with(|| target_miss(a).cmp(&target_miss(b)))
        .then_with(|| a.reliability_class.cmp(&b.reliability_class))
        .then_with(|| {
            tmin_distance(a, query.target_temperature)
                .total_cmp(&tmin_distance(b, query.target_temperature))
        })
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Thermodynamics::DBhandlers::compound_record::tests::record;
    use crate::Thermodynamics::DBhandlers::record_store::InMemoryStore;

    fn store() -> InMemoryStore {
        let mut gas = record(3, "H2O(g)", Phase::Gas, Some(373.15), Some(2500.0));
        gas.reliability_class = 2;
        let mut sulfate = record(10, "SO4(2-)", Phase::Ion, None, None);
        sulfate.reliability_class = 2;
        InMemoryStore::new(vec![
            record(1, "H2O", Phase::Liquid, Some(273.15), Some(373.15)),
            record(2, "H2O", Phase::Solid, Some(150.0), Some(273.15)),
            gas,
            record(4, "H2O(g)", Phase::Gas, Some(298.15), Some(1500.0)),
            sulfate,
            record(11, "HSO4(-)", Phase::Ion, None, None),
            record(12, "Fe2O3(hematite)", Phase::Solid, Some(298.15), Some(950.0)),
        ])
    }

    fn ids(rows: &[MatchedRecord]) -> Vec<u64> {
        rows.iter().map(|r| r.record.id).collect()
    }

    #[test]
    fn test_search_orders_by_phase_then_containment() {
        let store = store();
        let qb = QueryBuilder::default();
        let query = qb.build(" H2O ", Some(Phase::Gas), Some(300.0));
        let rows = qb.search(&store, &query).unwrap();
        // gas rows first, the one covering 300 K ahead; then liquid and solid by containment
        assert_eq!(ids(&rows), vec![4, 3, 1, 2]);
        assert_eq!(rows[0].variant, MatchVariant::Prefix);
        assert_eq!(rows[2].variant, MatchVariant::Exact);
    }

    #[test]
    fn test_search_is_deterministic_without_hints() {
        let store = store();
        let qb = QueryBuilder::default();
        let query = qb.build("H2O", None, None);
        let first = ids(&qb.search(&store, &query).unwrap());
        let second = ids(&qb.search(&store, &query).unwrap());
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 2, 4, 3]);
    }

    #[test]
    fn test_ionic_expansion_only_when_empty() {
        let store = store();
        let qb = QueryBuilder::default();
        let query = qb.build("H2SO4", None, Some(298.15));
        let rows = qb.search(&store, &query).unwrap();
        assert_eq!(ids(&rows), vec![11, 10]);
        assert!(rows.iter().all(|r| r.variant == MatchVariant::Ionic));
    }

    #[test]
    fn test_cap_and_unknown_formula() {
        let store = store();
        let qb = QueryBuilder::new(2);
        let query = qb.build("H2O", None, Some(300.0));
        assert_eq!(qb.search(&store, &query).unwrap().len(), 2);
        let query = qb.build("Xyz123", None, Some(300.0));
        assert!(qb.search(&store, &query).unwrap().is_empty());
    }

    #[test]
    fn test_relaxed_search() {
        let store = store();
        let qb = QueryBuilder::default();
        let query = qb.build("Fe2O3(s)", None, Some(500.0));
        assert!(qb.search(&store, &query).unwrap().is_empty());
        let rows = qb.search_relaxed(&store, &query).unwrap();
        assert_eq!(ids(&rows), vec![12]);
        assert_eq!(rows[0].variant, MatchVariant::Relaxed);
    }
}

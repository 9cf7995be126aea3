//! Per-compound orchestration: query -> store -> filter pipeline -> range builder,
//! for all compounds of a request on a bounded rayon pool.
use crate::Thermodynamics::ChemReaction::reaction_request::CompoundSpec;
use crate::Thermodynamics::CompoundSearch::filter_pipeline::{
    Deadline, FilterPipeline, PipelineOutcome,
};
use crate::Thermodynamics::CompoundSearch::record_range_builder::{
    RangeSelection, RecordRangeBuilder,
};
use crate::Thermodynamics::DBhandlers::record_store::CompoundRecordStore;
use crate::Thermodynamics::thermo_errors::ThermoError;
use log::{debug, info};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

/// everything known about one resolved compound
#[derive(Debug, Clone)]
pub struct CompoundResolution {
    pub spec: CompoundSpec,
    pub outcome: PipelineOutcome,
    pub selection: RangeSelection,
}

pub struct CompoundResolver<S> {
    store: S,
    pub pipeline: FilterPipeline,
    pub range_builder: RecordRangeBuilder,
    pub max_concurrency: usize,
}

impl<S: CompoundRecordStore + Sync> CompoundResolver<S> {
    pub fn new(store: S, pipeline: FilterPipeline, max_concurrency: usize) -> Self {
        Self {
            store,
            pipeline,
            range_builder: RecordRangeBuilder::new(),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `NotFound` when no candidate survives the filter
    pub fn resolve_one(
        &self,
        spec: &CompoundSpec,
        t_range: (f64, f64),
        deadline: Option<&Deadline>,
    ) -> Result<CompoundResolution, ThermoError> {
        let outcome = self
            .pipeline
            .run(&self.store, &spec.key, spec.phase_hint, t_range, deadline)?;
        if outcome.candidates.is_empty() {
            debug!("{}: no candidates after filtering", spec.name);
            return Err(ThermoError::NotFound {
                missing: vec![spec.name.clone()],
            });
        }
        Deadline::check(deadline)?;
        let selection =
            self.range_builder
                .build(&spec.key, &outcome.candidates, t_range, spec.phase_hint);
        Ok(CompoundResolution {
            spec: spec.clone(),
            outcome,
            selection,
        })
    }

    /// One result per compound, in request order. The outer error is reserved
    /// for a pool that could not be started.
    pub fn resolve_all(
        &self,
        specs: &[CompoundSpec],
        t_range: (f64, f64),
        deadline: Option<&Deadline>,
    ) -> Result<Vec<Result<CompoundResolution, ThermoError>>, ThermoError> {
        let threads = self.max_concurrency.min(specs.len()).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ThermoError::WorkerPool(e.to_string()))?;
        info!(
            "resolving {} compound(s) on {} thread(s)",
            specs.len(),
            threads
        );
        Ok(pool.install(|| {
            specs
                .par_iter()
                .map(|spec| self.resolve_one(spec, t_range, deadline))
                .collect()
        }))
    }
}

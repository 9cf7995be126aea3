/// orchestration of the search of all compounds of a request
pub mod compound_resolver;
/// six-stage filter and ranking of the records of one compound
pub mod filter_pipeline;
/// temperature segments covering the requested range
pub mod record_range_builder;

#[allow(non_snake_case)]
/// reaction requests, equation parsing, aggregation of reaction quantities and results
pub mod ChemReaction;
#[allow(non_snake_case)]
/// per-compound search: filter pipeline, temperature segments, parallel resolution
pub mod CompoundSearch;
#[allow(non_snake_case)]
/// compound records, formula variants, record stores and queries
pub mod DBhandlers;
/// Cp, H, S, G of a single record
#[allow(non_snake_case)]
pub mod thermo_engine;
pub mod thermo_errors;
/// main entry point: a whole request from validation to aggregated data
pub mod thermo_lib_api;

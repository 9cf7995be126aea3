/// one row of the reference dataset
pub mod compound_record;
/// normalization and variants of chemical formulas
pub mod formula_variants;
/// search of one compound: query construction and row ranking
pub mod query_builder;
/// read-only stores of compound records: in memory, JSON file, retries and cache
pub mod record_store;

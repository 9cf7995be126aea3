/// parsing of reaction equations like "2H2 + O2 -> 2H2O"
pub mod equation_parser;
/// ΔH, ΔS, ΔG, K of a reaction over a temperature grid
#[allow(non_snake_case)]
pub mod reaction_engine;
#[allow(non_snake_case)]
pub mod reaction_output;
/// request of a calculation and its validation
pub mod reaction_request;

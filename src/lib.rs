//! # ThermoReact
//!
//! Resolution of thermochemical records of chemical compounds and calculation
//! of Cp, H, S, G of compounds and ΔH, ΔS, ΔG, K of reactions over a
//! temperature grid. The main entry point is
//! [`Thermodynamics::thermo_lib_api::ThermoData`].
#[allow(non_snake_case)]
pub mod Examples;
#[allow(non_snake_case)]
pub mod Thermodynamics;
#[allow(non_snake_case)]
pub mod Utils;
pub mod settings;

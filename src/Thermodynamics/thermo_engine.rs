//! # Cp, H, S and G of one record
//!
//! ```text
//! Cp(T) = f1 + f2·T/10³ + f3·10⁵/T² + f4·T²/10⁶ + f5·10³/T³ + f6·10⁻⁹·T³     J/mol/K
//! H(T)  = H298·1000 + ∫ Cp dt    from 298.15 K to T                           J/mol
//! S(T)  = S298 + ∫ Cp/t dt       from 298.15 K to T                           J/mol/K
//! G(T)  = H − T·S                                                              J/mol
//! ```
//! The integrals are taken in closed form. Composite Simpson quadrature gives the
//! same numbers to 1e-6 and is kept to cross-check the closed form.
use crate::Thermodynamics::CompoundSearch::record_range_builder::TemperatureSegment;
use crate::Thermodynamics::DBhandlers::compound_record::CompoundRecord;
use crate::Thermodynamics::thermo_errors::ThermoEngineError;
use serde::{Deserialize, Serialize};

/// reference temperature of H298 and S298, K
pub const T_REF: f64 = 298.15;
/// gas constant, J/mol/K
pub const R: f64 = 8.314;
pub const DEFAULT_SIMPSON_INTERVALS: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum IntegrationMethod {
    #[default]
    ClosedForm,
    Simpson { intervals: usize },
}

/// thermodynamic state of one compound at one temperature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermoPoint {
    pub T: f64,
    /// J/mol/K
    pub Cp: f64,
    /// J/mol
    pub H: f64,
    /// J/mol/K
    pub S: f64,
    /// J/mol
    pub G: f64,
    pub in_range: bool,
}

pub fn calculate_Cp(f: &[f64; 6], T: f64) -> f64 {
    f[0] + f[1] * T / 1e3 + f[2] * 1e5 / T.powi(2) + f[3] * T.powi(2) / 1e6 + f[4] * 1e3 / T.powi(3)
        + f[5] * 1e-9 * T.powi(3)
}

/// antiderivative of Cp
fn Cp_primitive(f: &[f64; 6], T: f64) -> f64 {
    f[0] * T + f[1] * T.powi(2) / 2e3 - f[2] * 1e5 / T + f[3] * T.powi(3) / 3e6
        - f[4] * 1e3 / (2.0 * T.powi(2))
        + f[5] * 1e-9 * T.powi(4) / 4.0
}

/// antiderivative of Cp/T without the logarithmic term
fn Cp_over_T_primitive(f: &[f64; 6], T: f64) -> f64 {
    f[1] * T / 1e3 - f[2] * 1e5 / (2.0 * T.powi(2)) + f[3] * T.powi(2) / 2e6
        - f[4] * 1e3 / (3.0 * T.powi(3))
        + f[5] * 1e-9 * T.powi(3) / 3.0
}

/// ∫ Cp dt from T_REF to T
pub fn Cp_integral(f: &[f64; 6], T: f64) -> f64 {
    Cp_primitive(f, T) - Cp_primitive(f, T_REF)
}

/// ∫ Cp/t dt from T_REF to T
pub fn Cp_over_T_integral(f: &[f64; 6], T: f64) -> f64 {
    f[0] * (T / T_REF).ln() + Cp_over_T_primitive(f, T) - Cp_over_T_primitive(f, T_REF)
}

/// composite Simpson rule; an odd interval count is rounded up
pub fn simpson(fun: impl Fn(f64) -> f64, a: f64, b: f64, intervals: usize) -> f64 {
    let n = (intervals.max(2) + 1) & !1;
    let h = (b - a) / n as f64;
    let inner: f64 = (1..n)
        .map(|i| {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            weight * fun(a + i as f64 * h)
        })
        .sum();
    h / 3.0 * (fun(a) + inner + fun(b))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThermodynamicEngine {
    pub method: IntegrationMethod,
}

impl ThermodynamicEngine {
    pub fn new(method: IntegrationMethod) -> Self {
        Self { method }
    }

    /// point of the segment's record; flagged out of range outside the segment
    pub fn evaluate(
        &self,
        segment: &TemperatureSegment,
        T: f64,
    ) -> Result<ThermoPoint, ThermoEngineError> {
        let mut point = self.evaluate_record(&segment.record, T)?;
        point.in_range = segment.contains(T);
        Ok(point)
    }

    /// point of a bare record; flagged out of range outside [Tmin, Tmax]
    pub fn evaluate_record(
        &self,
        record: &CompoundRecord,
        T: f64,
    ) -> Result<ThermoPoint, ThermoEngineError> {
        if !(T.is_finite() && T > 0.0) {
            return Err(ThermoEngineError::InvalidTemperature(T));
        }
        let f = record.coefficients();
        let (int_Cp, int_Cp_T) = match self.method {
            IntegrationMethod::ClosedForm => (Cp_integral(&f, T), Cp_over_T_integral(&f, T)),
            IntegrationMethod::Simpson { intervals } => (
                simpson(|t| calculate_Cp(&f, t), T_REF, T, intervals),
                simpson(|t| calculate_Cp(&f, t) / t, T_REF, T, intervals),
            ),
        };
        let Cp = calculate_Cp(&f, T);
        let H = record.h298 * 1000.0 + int_Cp;
        let S = record.s298 + int_Cp_T;
        let G = H - T * S;
        for (quantity, value) in [("Cp", Cp), ("H", H), ("S", S), ("G", G)] {
            if !value.is_finite() {
                return Err(ThermoEngineError::NonFinite {
                    quantity,
                    temperature: T,
                    record_id: record.id,
                });
            }
        }
        Ok(ThermoPoint {
            T,
            Cp,
            H,
            S,
            G,
            in_range: record.covers(T),
        })
    }
}

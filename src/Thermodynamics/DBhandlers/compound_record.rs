//! # Compound records of the reference dataset
//!
//! One [`CompoundRecord`] is one row of the dataset: formula, phase, temperature
//! validity range, standard enthalpy and entropy and six coefficients of the heat
//! capacity polynomial
//!
//! `Cp(T) = f1 + f2·T/10³ + f3·10⁵/T² + f4·T²/10⁶ + f5·10³/T³ + f6·10⁻⁹·T³`  (J/mol/K)
//!
//! Records are immutable once loaded and shared between pipelines as `Arc`.
use crate::Thermodynamics::thermo_errors::RequestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase enum: solid, liquid, gas, aqueous solution, ion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Solid,
    Liquid,
    Gas,
    Aqueous,
    Ion,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Solid => "solid",
            Phase::Liquid => "liquid",
            Phase::Gas => "gas",
            Phase::Aqueous => "aqueous",
            Phase::Ion => "ion",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Phase {
    type Err = RequestError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "solid" | "c" | "cr" | "crystal" => Ok(Phase::Solid),
            "l" | "liquid" | "liq" => Ok(Phase::Liquid),
            "g" | "gas" | "vapour" | "vapor" => Ok(Phase::Gas),
            "aq" | "aqueous" | "solution" => Ok(Phase::Aqueous),
            "ion" | "ionic" => Ok(Phase::Ion),
            other => Err(RequestError::UnknownPhase(other.to_string())),
        }
    }
}

/// Phase a substance must be in at temperature t given its transition points:
/// solid below Tmelt, liquid from Tmelt to Tboil, gas from Tboil up.
/// None when the transitions known do not decide it.
pub fn phase_by_transitions(t_melt: Option<f64>, t_boil: Option<f64>, t: f64) -> Option<Phase> {
    match (t_melt, t_boil) {
        (Some(tm), _) if t < tm => Some(Phase::Solid),
        (_, Some(tb)) if t >= tb => Some(Phase::Gas),
        (Some(_), _) => Some(Phase::Liquid),
        (None, _) => None,
    }
}

/// one row of the reference dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundRecord {
    /// row id, unique within the dataset; last tie-breaker of every ranking
    pub id: u64,
    pub formula: String,
    pub phase: Phase,
    /// lower validity bound, K; None means unbounded
    #[serde(default)]
    pub t_min: Option<f64>,
    /// upper validity bound, K; None means unbounded
    #[serde(default)]
    pub t_max: Option<f64>,
    /// standard enthalpy of formation at 298.15 K, kJ/mol
    pub h298: f64,
    /// standard entropy at 298.15 K, J/mol/K
    pub s298: f64,
    #[serde(default)]
    pub f1: f64,
    #[serde(default)]
    pub f2: f64,
    #[serde(default)]
    pub f3: f64,
    #[serde(default)]
    pub f4: f64,
    #[serde(default)]
    pub f5: f64,
    #[serde(default)]
    pub f6: f64,
    /// 1 is the most trusted, 3 the least
    pub reliability_class: u8,
    #[serde(default)]
    pub t_melt: Option<f64>,
    #[serde(default)]
    pub t_boil: Option<f64>,
    #[serde(default)]
    pub cas: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub second_name: Option<String>,
}

impl CompoundRecord {
    pub fn coefficients(&self) -> [f64; 6] {
        [self.f1, self.f2, self.f3, self.f4, self.f5, self.f6]
    }

    /// lower bound, unbounded maps to 0 K
    pub fn lower(&self) -> f64 {
        self.t_min.unwrap_or(0.0)
    }

    /// upper bound, unbounded maps to +inf
    pub fn upper(&self) -> f64 {
        self.t_max.unwrap_or(f64::INFINITY)
    }

    pub fn is_unbounded(&self) -> bool {
        self.t_min.is_none() || self.t_max.is_none()
    }

    /// closed-interval coverage of temperature t
    pub fn covers(&self, t: f64) -> bool {
        self.lower() <= t && t <= self.upper()
    }

    /// true when [lo, hi] lies completely inside [t_min, t_max]
    pub fn covers_range(&self, lo: f64, hi: f64) -> bool {
        self.lower() <= lo && hi <= self.upper()
    }

    /// true when [t_min, t_max] and [lo, hi] share at least one point
    pub fn intersects(&self, lo: f64, hi: f64) -> bool {
        self.lower() <= hi && lo <= self.upper()
    }

    /// length of the overlap of [t_min, t_max] with [lo, hi]
    pub fn overlap(&self, lo: f64, hi: f64) -> f64 {
        (self.upper().min(hi) - self.lower().max(lo)).max(0.0)
    }

    /// identity of the thermodynamic data regardless of the validity range
    pub fn same_data(&self, other: &CompoundRecord) -> bool {
        self.phase == other.phase
            && self.h298 == other.h298
            && self.s298 == other.s298
            && self.coefficients() == other.coefficients()
    }

    /// checks the row before it is admitted into a store
    pub fn validate(&self) -> Result<(), String> {
        if self.formula.trim().is_empty() {
            return Err(format!("record {} has an empty formula", self.id));
        }
        if let (Some(lo), Some(hi)) = (self.t_min, self.t_max) {
            if lo > hi {
                return Err(format!(
                    "record {} ({}) has t_min {} > t_max {}",
                    self.id, self.formula, lo, hi
                ));
            }
        }
        if self.t_min.is_some_and(|t| t < 0.0) {
            return Err(format!("record {} has a negative t_min", self.id));
        }
        if !(1..=3).contains(&self.reliability_class) {
            return Err(format!(
                "record {} has reliability class {} outside 1..=3",
                self.id, self.reliability_class
            ));
        }
        let finite = self.coefficients().iter().all(|c| c.is_finite())
            && self.h298.is_finite()
            && self.s298.is_finite();
        if !finite {
            return Err(format!("record {} has non-finite data", self.id));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// record builder used by the tests of the whole crate
    pub(crate) fn record(
        id: u64,
        formula: &str,
        phase: Phase,
        t_min: Option<f64>,
        t_max: Option<f64>,
    ) -> CompoundRecord {
        CompoundRecord {
            id,
            formula: formula.to_string(),
            phase,
            t_min,
            t_max,
            h298: -100.0,
            s298: 50.0,
            f1: 30.0,
            f2: 5.0,
            f3: -1.0,
            f4: 0.0,
            f5: 0.0,
            f6: 0.0,
            reliability_class: 1,
            t_melt: None,
            t_boil: None,
            cas: None,
            first_name: None,
            second_name: None,
        }
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!("l".parse::<Phase>().unwrap(), Phase::Liquid);
        assert_eq!(" Gas ".parse::<Phase>().unwrap(), Phase::Gas);
        assert_eq!("aq".parse::<Phase>().unwrap(), Phase::Aqueous);
        assert!(matches!(
            "plasma".parse::<Phase>(),
            Err(RequestError::UnknownPhase(p)) if p == "plasma"
        ));
    }

    #[test]
    fn test_phase_by_transitions() {
        let (tm, tb) = (Some(273.15), Some(373.15));
        assert_eq!(phase_by_transitions(tm, tb, 200.0), Some(Phase::Solid));
        assert_eq!(phase_by_transitions(tm, tb, 273.15), Some(Phase::Liquid));
        assert_eq!(phase_by_transitions(tm, tb, 373.15), Some(Phase::Gas));
        assert_eq!(phase_by_transitions(tm, None, 900.0), Some(Phase::Liquid));
        assert_eq!(phase_by_transitions(None, tb, 300.0), None);
        assert_eq!(phase_by_transitions(None, tb, 400.0), Some(Phase::Gas));
        assert_eq!(phase_by_transitions(None, None, 400.0), None);
    }

    #[test]
    fn test_ranges() {
        let r = record(1, "Zn", Phase::Solid, Some(298.15), Some(692.73));
        assert!(r.covers(298.15));
        assert!(r.covers(692.73));
        assert!(!r.covers(298.0));
        assert!(r.intersects(600.0, 1000.0));
        assert!(!r.intersects(700.0, 1000.0));
        assert!((r.overlap(600.0, 1000.0) - 92.73).abs() < 1e-9);

        let unbounded = record(2, "Cl(-)", Phase::Ion, None, None);
        assert!(unbounded.is_unbounded());
        assert!(unbounded.covers_range(1.0, 1e6));
    }

    #[test]
    fn test_validate() {
        let mut r = record(1, "Zn", Phase::Solid, Some(500.0), Some(300.0));
        assert!(r.validate().is_err());
        r.t_max = Some(900.0);
        assert!(r.validate().is_ok());
        r.reliability_class = 4;
        assert!(r.validate().is_err());
        r.reliability_class = 2;
        r.f3 = f64::NAN;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"id": 7, "formula": "Cl(-)", "phase": "ion", "h298": -167.08,
                       "s298": 56.6, "f1": -136.4, "reliability_class": 2}"#;
        let r: CompoundRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.phase, Phase::Ion);
        assert_eq!(r.t_min, None);
        assert_eq!(r.coefficients(), [-136.4, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }
}

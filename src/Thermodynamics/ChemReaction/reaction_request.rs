//! Structured request of a calculation and its validation.
use crate::Thermodynamics::ChemReaction::equation_parser::{ReactionParticipant, parse_equation};
use crate::Thermodynamics::DBhandlers::compound_record::Phase;
use crate::Thermodynamics::DBhandlers::formula_variants::normalize_formula;
use crate::Thermodynamics::thermo_errors::RequestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_COMPOUNDS: usize = 10;
pub const DEFAULT_TEMPERATURE_STEP: f64 = 100.0;
/// tolerance of the inclusive upper end of the grid
const GRID_TOLERANCE: f64 = 1e-9;

/// quantities that can be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    Cp,
    H,
    S,
    G,
    DeltaH,
    DeltaS,
    DeltaG,
    K,
}

impl Property {
    pub const ALL: [Property; 8] = [
        Property::Cp,
        Property::H,
        Property::S,
        Property::G,
        Property::DeltaH,
        Property::DeltaS,
        Property::DeltaG,
        Property::K,
    ];

    pub fn is_reaction_property(&self) -> bool {
        matches!(
            self,
            Property::DeltaH | Property::DeltaS | Property::DeltaG | Property::K
        )
    }

    /// column header with units
    pub fn header(&self) -> &'static str {
        match self {
            Property::Cp => "Cp, J/mol/K",
            Property::H => "H, J/mol",
            Property::S => "S, J/mol/K",
            Property::G => "G, J/mol",
            Property::DeltaH => "dH, kJ/mol",
            Property::DeltaS => "dS, J/mol/K",
            Property::DeltaG => "dG, kJ/mol",
            Property::K => "K",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Property {
    type Err = RequestError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "cp" | "heatcapacity" => Ok(Property::Cp),
            "h" | "enthalpy" => Ok(Property::H),
            "s" | "entropy" => Ok(Property::S),
            "g" | "gibbs" | "gibbsenergy" => Ok(Property::G),
            "dh" | "deltah" | "δh" => Ok(Property::DeltaH),
            "ds" | "deltas" | "δs" => Ok(Property::DeltaS),
            "dg" | "deltag" | "δg" => Ok(Property::DeltaG),
            "k" | "keq" | "equilibriumconstant" => Ok(Property::K),
            _ => Err(RequestError::UnknownProperty(s.to_string())),
        }
    }
}

/// request as it comes from the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRequest {
    pub compounds: Vec<String>,
    /// [start, end], K
    pub temperature_range: [f64; 2],
    #[serde(default)]
    pub temperature_step: Option<f64>,
    /// one optional phase per compound: "s", "l", "g", "aq", "ion" or full names
    #[serde(default)]
    pub phases: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub properties: Option<Vec<String>>,
    #[serde(default)]
    pub reaction_equation: Option<String>,
}

impl ReactionRequest {
    pub fn new(compounds: &[&str], temperature_range: [f64; 2]) -> Self {
        Self {
            compounds: compounds.iter().map(|c| c.to_string()).collect(),
            temperature_range,
            temperature_step: None,
            phases: None,
            properties: None,
            reaction_equation: None,
        }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.temperature_step = Some(step);
        self
    }

    pub fn with_phases(mut self, phases: &[Option<&str>]) -> Self {
        self.phases = Some(phases.iter().map(|p| p.map(str::to_string)).collect());
        self
    }

    pub fn with_properties(mut self, properties: &[&str]) -> Self {
        self.properties = Some(properties.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_equation(mut self, equation: &str) -> Self {
        self.reaction_equation = Some(equation.to_string());
        self
    }

    /// checks the request and turns it into the form the pipeline works with
    pub fn validate(&self, default_step: f64) -> Result<ValidatedRequest, RequestError> {
        let [t_start, t_end] = self.temperature_range;
        if !(t_start.is_finite() && t_end.is_finite() && t_start > 0.0 && t_start <= t_end) {
            return Err(RequestError::TemperatureRange(t_start, t_end));
        }
        let step = self.temperature_step.unwrap_or(default_step);
        if !(step.is_finite() && step > 0.0) {
            return Err(RequestError::TemperatureStep(step));
        }
        if let Some(phases) = &self.phases {
            if phases.len() != self.compounds.len() {
                return Err(RequestError::PhaseCount {
                    phases: phases.len(),
                    compounds: self.compounds.len(),
                });
            }
        }

        let mut compounds: Vec<CompoundSpec> = Vec::with_capacity(self.compounds.len());
        for (i, raw) in self.compounds.iter().enumerate() {
            let name = raw.trim();
            if name.is_empty() {
                return Err(RequestError::EmptyFormula(i));
            }
            let phase_hint = match self.phases.as_ref().and_then(|p| p[i].as_deref()) {
                Some(p) if !p.trim().is_empty() => Some(p.parse::<Phase>()?),
                _ => None,
            };
            let key = normalize_formula(name);
            match compounds.iter_mut().find(|c| c.key == key) {
                Some(seen) => match (seen.phase_hint, phase_hint) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(RequestError::ConflictingPhase {
                            formula: key,
                            first: a,
                            second: b,
                        });
                    }
                    (None, Some(_)) => seen.phase_hint = phase_hint,
                    _ => {}
                },
                None => compounds.push(CompoundSpec {
                    name: name.to_string(),
                    key,
                    phase_hint,
                }),
            }
        }

        let participants = match &self.reaction_equation {
            Some(eq) if !eq.trim().is_empty() => {
                let participants = parse_equation(eq)?;
                for p in &participants {
                    if compounds.iter().all(|c| c.key != p.formula) {
                        compounds.push(CompoundSpec {
                            name: p.formula.clone(),
                            key: p.formula.clone(),
                            phase_hint: None,
                        });
                    }
                }
                Some(participants)
            }
            _ => None,
        };
        if compounds.is_empty() || compounds.len() > MAX_COMPOUNDS {
            return Err(RequestError::CompoundCount {
                got: compounds.len(),
                max: MAX_COMPOUNDS,
            });
        }

        let properties = match &self.properties {
            Some(list) if !list.is_empty() => {
                let mut parsed = Vec::with_capacity(list.len());
                for p in list {
                    let p = p.parse::<Property>()?;
                    if !parsed.contains(&p) {
                        parsed.push(p);
                    }
                }
                parsed
            }
            _ => Property::ALL.to_vec(),
        };

        Ok(ValidatedRequest {
            compounds,
            participants,
            t_range: (t_start, t_end),
            grid: temperature_grid(t_start, t_end, step),
            properties,
            equation: self.reaction_equation.clone(),
        })
    }
}

/// one compound of a validated request
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundSpec {
    /// formula as the caller wrote it
    pub name: String,
    /// normalized formula, the key of the compound throughout a request
    pub key: String,
    pub phase_hint: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub compounds: Vec<CompoundSpec>,
    /// None for a pure property query
    pub participants: Option<Vec<ReactionParticipant>>,
    pub t_range: (f64, f64),
    pub grid: Vec<f64>,
    pub properties: Vec<Property>,
    pub equation: Option<String>,
}

/// `a, a + step, ...` while `<= b`
pub fn temperature_grid(a: f64, b: f64, step: f64) -> Vec<f64> {
    let mut grid = Vec::new();
    let mut i = 0usize;
    loop {
        let t = a + i as f64 * step;
        if t > b + GRID_TOLERANCE {
            break;
        }
        grid.push(t.min(b));
        i += 1;
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_grid() {
        assert_eq!(temperature_grid(300.0, 300.0, 100.0), vec![300.0]);
        let grid = temperature_grid(298.0, 1000.0, 100.0);
        assert_eq!(grid.len(), 8);
        assert_eq!(grid[7], 998.0);
        assert_eq!(temperature_grid(300.0, 1000.0, 100.0).len(), 8);
        // 0.1 steps accumulate rounding error; the end must still be included
        let grid = temperature_grid(300.0, 301.0, 0.1);
        assert_eq!(grid.len(), 11);
        assert_eq!(grid[10], 301.0);
    }

    #[test]
    fn test_validate_defaults() {
        let request = ReactionRequest::new(&["H2O"], [300.0, 300.0]).with_phases(&[Some("l")]);
        let v = request.validate(DEFAULT_TEMPERATURE_STEP).unwrap();
        assert_eq!(v.grid, vec![300.0]);
        assert_eq!(v.compounds[0].phase_hint, Some(Phase::Liquid));
        assert_eq!(v.properties.len(), 8);
        assert!(v.participants.is_none());
    }

    #[test]
    fn test_equation_participants_are_appended() {
        let request = ReactionRequest::new(&["Zn"], [298.0, 1000.0]).with_equation("Zn + S -> ZnS");
        let v = request.validate(DEFAULT_TEMPERATURE_STEP).unwrap();
        let keys: Vec<&str> = v.compounds.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["Zn", "S", "ZnS"]);
        assert_eq!(v.participants.unwrap().len(), 3);
    }

    #[test]
    fn test_validation_errors() {
        let base = ReactionRequest::new(&["Zn"], [300.0, 400.0]);
        let mut r = base.clone();
        r.temperature_range = [500.0, 400.0];
        assert!(matches!(r.validate(100.0), Err(RequestError::TemperatureRange(..))));
        r.temperature_range = [0.0, 400.0];
        assert!(matches!(r.validate(100.0), Err(RequestError::TemperatureRange(..))));
        assert!(matches!(
            base.clone().with_step(0.0).validate(100.0),
            Err(RequestError::TemperatureStep(_))
        ));
        assert!(matches!(
            base.clone().with_phases(&[Some("s"), None]).validate(100.0),
            Err(RequestError::PhaseCount { phases: 2, compounds: 1 })
        ));
        assert!(matches!(
            base.clone().with_phases(&[Some("plasma")]).validate(100.0),
            Err(RequestError::UnknownPhase(_))
        ));
        assert!(matches!(
            base.clone().with_properties(&["viscosity"]).validate(100.0),
            Err(RequestError::UnknownProperty(_))
        ));
        let many: Vec<String> = (0..11).map(|i| format!("C{}H4", i + 1)).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        assert!(matches!(
            ReactionRequest::new(&many, [300.0, 400.0]).validate(100.0),
            Err(RequestError::CompoundCount { got: 11, max: 10 })
        ));
        assert!(matches!(
            ReactionRequest::new(&[" "], [300.0, 400.0]).validate(100.0),
            Err(RequestError::EmptyFormula(0))
        ));
        assert!(matches!(
            ReactionRequest::new(&[], [300.0, 400.0]).validate(100.0),
            Err(RequestError::CompoundCount { got: 0, .. })
        ));
    }

    #[test]
    fn test_repeated_compound_phase_hints() {
        let conflicting = ReactionRequest::new(&["H2O", "H₂O"], [300.0, 400.0])
            .with_phases(&[Some("l"), Some("g")]);
        assert!(matches!(
            conflicting.validate(100.0),
            Err(RequestError::ConflictingPhase {
                first: Phase::Liquid,
                second: Phase::Gas,
                ..
            })
        ));
        // a hint given once is kept for the merged compound
        let v = ReactionRequest::new(&["H2O", "H2O"], [300.0, 400.0])
            .with_phases(&[None, Some("g")])
            .validate(100.0)
            .unwrap();
        assert_eq!(v.compounds.len(), 1);
        assert_eq!(v.compounds[0].phase_hint, Some(Phase::Gas));
    }

    #[test]
    fn test_property_names() {
        assert_eq!("ΔH".parse::<Property>().unwrap(), Property::DeltaH);
        assert_eq!("delta_g".parse::<Property>().unwrap(), Property::DeltaG);
        assert_eq!(" Cp ".parse::<Property>().unwrap(), Property::Cp);
        assert!(Property::K.is_reaction_property());
        assert!(!Property::S.is_reaction_property());
    }

    #[test]
    fn test_request_from_json() {
        let json = r#"{"compounds": ["TiO2"], "temperature_range": [400, 1500],
                       "phases": [null], "properties": ["Cp", "G"]}"#;
        let request: ReactionRequest = serde_json::from_str(json).unwrap();
        let v = request.validate(DEFAULT_TEMPERATURE_STEP).unwrap();
        assert_eq!(v.properties, vec![Property::Cp, Property::G]);
        assert_eq!(v.grid.len(), 12);
    }
}

//! Parsing of reaction equations such as `2H2 + O2 -> 2H2O` into participants.
use crate::Thermodynamics::DBhandlers::formula_variants::normalize_formula;
use crate::Thermodynamics::thermo_errors::RequestError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// longer separators first: `<=>` contains both `=>` and `=`
const SEPARATORS: [&str; 6] = ["<=>", "⇄", "->", "=>", "→", "="];

static TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<coeff>\d+(?:\.\d+)?|\.\d+)?\s*\*?\s*(?P<formula>.+)$").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Reactant,
    Product,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionParticipant {
    /// normalized formula
    pub formula: String,
    pub coefficient: f64,
    pub role: Role,
}

impl ReactionParticipant {
    pub fn new(formula: &str, coefficient: f64, role: Role) -> Result<Self, RequestError> {
        let formula = normalize_formula(formula);
        if formula.is_empty() {
            return Err(RequestError::EquationParse {
                equation: formula,
                reason: "empty formula".to_string(),
            });
        }
        if !(coefficient.is_finite() && coefficient > 0.0) {
            return Err(RequestError::EquationParse {
                equation: formula,
                reason: format!("coefficient {} must be finite and positive", coefficient),
            });
        }
        Ok(Self {
            formula,
            coefficient,
            role,
        })
    }

    /// coefficient with the sign of Δ = Σ products − Σ reactants
    pub fn signed_coefficient(&self) -> f64 {
        match self.role {
            Role::Reactant => -self.coefficient,
            Role::Product => self.coefficient,
        }
    }
}

/// reactants and products of an equation; a species repeated on one side is summed
pub fn parse_equation(equation: &str) -> Result<Vec<ReactionParticipant>, RequestError> {
    let fail = |reason: &str| RequestError::EquationParse {
        equation: equation.to_string(),
        reason: reason.to_string(),
    };
    let (left, right) = SEPARATORS
        .iter()
        .find_map(|sep| equation.split_once(*sep))
        .ok_or_else(|| fail("no reaction arrow found"))?;
    if SEPARATORS.iter().any(|sep| right.contains(*sep)) {
        return Err(fail("more than one reaction arrow"));
    }
    let mut participants: Vec<ReactionParticipant> = Vec::new();
    for (side, role) in [(left, Role::Reactant), (right, Role::Product)] {
        let terms = split_side(side);
        if terms.is_empty() {
            return Err(fail("one side of the equation is empty"));
        }
        for term in terms {
            let caps = TERM
                .captures(term)
                .ok_or_else(|| fail(&format!("cannot read term '{}'", term)))?;
            let coefficient = match caps.name("coeff") {
                Some(c) => c
                    .as_str()
                    .parse::<f64>()
                    .map_err(|e| fail(&format!("bad coefficient in '{}': {}", term, e)))?,
                None => 1.0,
            };
            let participant = ReactionParticipant::new(&caps["formula"], coefficient, role)
                .map_err(|e| match e {
                    RequestError::EquationParse { reason, .. } => fail(&reason),
                    other => other,
                })?;
            match participants
                .iter_mut()
                .find(|p| p.role == role && p.formula == participant.formula)
            {
                Some(existing) => existing.coefficient += participant.coefficient,
                None => participants.push(participant),
            }
        }
    }
    Ok(participants)
}

/// Terms of one side. With spaced pluses (`Na+ + Cl-`) only ` + ` separates terms,
/// otherwise a `+` outside brackets followed by an element or a coefficient does.
fn split_side(side: &str) -> Vec<&str> {
    let side = side.trim();
    if side.is_empty() {
        return Vec::new();
    }
    if side.contains(" + ") {
        return side
            .split(" + ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
    }
    let mut terms = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let chars: Vec<(usize, char)> = side.char_indices().collect();
    for (k, &(i, c)) in chars.iter().enumerate() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            '+' if depth == 0 => {
                let next_starts_term = chars
                    .get(k + 1)
                    .is_some_and(|&(_, n)| n.is_ascii_uppercase() || n.is_ascii_digit());
                if next_starts_term && i > start {
                    terms.push(side[start..i].trim());
                    start = i + 1;
                }
            }
            _ => {}
        }
    }
    terms.push(side[start..].trim());
    terms.into_iter().filter(|t| !t.is_empty()).collect()
}

//! Canonical forms of chemical formulas and their search variants.
//!
//! The dataset writes phase or modification qualifiers and ionic charges in
//! trailing brackets: `H2O(g)`, `Fe2O3(hematite)`, `SO4(2-)`, `Cl(-)`. A user
//! formula is brought to the same notation before it is searched, and every
//! record returned by the store is tagged with the variant that matched it.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// acid ⇄ anion expansions used when a formula is not found as written
const IONIC_SYNONYMS: &[(&str, &[&str])] = &[
    ("H2SO4", &["SO4(2-)", "HSO4(-)"]),
    ("H2SO3", &["SO3(2-)", "HSO3(-)"]),
    ("HCl", &["Cl(-)"]),
    ("HBr", &["Br(-)"]),
    ("HI", &["I(-)"]),
    ("HF", &["F(-)"]),
    ("HNO3", &["NO3(-)"]),
    ("HNO2", &["NO2(-)"]),
    ("H3PO4", &["PO4(3-)", "HPO4(2-)", "H2PO4(-)"]),
    ("H2CO3", &["CO3(2-)", "HCO3(-)"]),
    ("H2S", &["S(2-)", "HS(-)"]),
    ("HClO4", &["ClO4(-)"]),
    ("CH3COOH", &["CH3COO(-)"]),
    ("NH3", &["NH4(+)"]),
];

static CHARGE_WITH_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<body>\S+?)(?:\s+|\^)(?P<n>\d*)(?P<sign>[+-])$").expect("valid regex")
});
static CHARGE_SIGNS_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<body>.*[A-Za-z0-9\]])(?P<signs>\++|-+)$").expect("valid regex")
});
static ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]?)(\d*)").expect("valid regex"));
static GROUP_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("valid regex"));

/// which formula variant made a record a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchVariant {
    /// record formula equals the query
    Exact,
    /// record formula is the query followed by a bracketed qualifier
    Prefix,
    /// record formula is an acid/anion counterpart of the query
    Ionic,
    /// record shares the query's formula once trailing qualifiers are stripped
    Relaxed,
}

fn is_superscript(c: char) -> bool {
    matches!(c, '⁰' | '¹' | '²' | '³' | '⁴'..='⁹' | '⁺' | '⁻')
}

fn map_unicode(c: char) -> Option<char> {
    let mapped = match c {
        '₀'..='₉' => char::from_digit(c as u32 - '₀' as u32, 10)?,
        '⁰' => '0',
        '¹' => '1',
        '²' => '2',
        '³' => '3',
        '⁴'..='⁹' => char::from_digit(c as u32 - '⁴' as u32 + 4, 10)?,
        '⁺' => '+',
        '⁻' | '−' => '-',
        other => other,
    };
    Some(mapped)
}

/// canonical notation: no whitespace, ASCII digits, charges as `(n±)`.
/// Letter case is kept as given since `CO` and `Co` are different substances.
pub fn normalize_formula(raw: &str) -> String {
    let trimmed = raw.trim();
    // a trailing superscript run is always a charge: SO₄²⁻ -> SO4^2-
    let (body, superscript) = trimmed.split_at(trimmed.trim_end_matches(is_superscript).len());
    let mut mapped: String = body.chars().filter_map(map_unicode).collect();
    if !superscript.is_empty() {
        mapped.push('^');
        mapped.extend(superscript.chars().filter_map(map_unicode));
    }
    let charged = if mapped.ends_with(')') {
        mapped
    } else if let Some(caps) = CHARGE_WITH_SEPARATOR.captures(&mapped) {
        let n = match &caps["n"] {
            "" | "1" => String::new(),
            n => n.to_string(),
        };
        format!("{}({}{})", &caps["body"], n, &caps["sign"])
    } else if let Some(caps) = CHARGE_SIGNS_ONLY.captures(&mapped) {
        let signs = &caps["signs"];
        let sign = &signs[..1];
        if signs.len() > 1 {
            format!("{}({}{})", &caps["body"], signs.len(), sign)
        } else {
            format!("{}({})", &caps["body"], sign)
        }
    } else {
        mapped
    };
    charged.chars().filter(|c| !c.is_whitespace()).collect()
}

/// formula without trailing bracketed qualifiers: `Fe2O3(hematite)` -> `Fe2O3`,
/// `SO4(2-)` -> `SO4`; chemical groups such as `Ca(OH)2` are left intact
pub fn base_formula(formula: &str) -> &str {
    let mut current = formula.trim();
    while current.ends_with(')') {
        let mut depth = 0usize;
        let mut open = None;
        for (i, c) in current.char_indices().rev() {
            match c {
                ')' => depth += 1,
                '(' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        open = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        match open {
            Some(i) if i > 0 => {
                let inner = &current[i + 1..current.len() - 1];
                if GROUP_FRAGMENT.is_match(inner) {
                    break;
                }
                current = &current[..i];
            }
            _ => break,
        }
    }
    current
}

/// acid/anion counterparts of a formula
pub fn ionic_synonyms(formula: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (acid, anions) in IONIC_SYNONYMS {
        if *acid == formula {
            out.extend(anions.iter().map(|a| a.to_string()));
        } else if anions.contains(&formula) {
            out.push(acid.to_string());
        }
    }
    out
}

/// number of atoms in the formula, bracket multipliers ignored
pub fn atom_count(formula: &str) -> usize {
    ELEMENT
        .captures_iter(base_formula(formula))
        .map(|caps| caps[2].parse::<usize>().unwrap_or(1))
        .sum()
}

pub fn is_multi_atom(formula: &str) -> bool {
    atom_count(formula) >= 2
}

/// tags a record formula against a normalized query and its synonyms
pub fn classify_match(record_formula: &str, query: &str, synonyms: &[String]) -> Option<MatchVariant> {
    let prefixed = |base: &str| {
        record_formula.len() > base.len() + 1
            && record_formula.starts_with(base)
            && record_formula[base.len()..].starts_with('(')
    };
    if record_formula == query {
        Some(MatchVariant::Exact)
    } else if prefixed(query) {
        Some(MatchVariant::Prefix)
    } else if synonyms
        .iter()
        .any(|s| s == record_formula || prefixed(s.as_str()))
    {
        Some(MatchVariant::Ionic)
    } else if base_formula(record_formula) == base_formula(query) {
        Some(MatchVariant::Relaxed)
    } else {
        None
    }
}

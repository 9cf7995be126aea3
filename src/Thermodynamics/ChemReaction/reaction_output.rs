//! Result of a request: reaction points, compound series, selection metadata,
//! warnings, plus the flat row view and its terminal table.
use crate::Thermodynamics::ChemReaction::reaction_engine::ReactionPoint;
use crate::Thermodynamics::ChemReaction::reaction_request::Property;
use crate::Thermodynamics::CompoundSearch::filter_pipeline::StageStatistics;
use crate::Thermodynamics::CompoundSearch::record_range_builder::{
    SegmentSource, TemperatureSegment,
};
use crate::Thermodynamics::DBhandlers::compound_record::Phase;
use crate::Thermodynamics::thermo_engine::ThermoPoint;
use crate::Thermodynamics::thermo_errors::ThermoWarning;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundSeries {
    pub formula: String,
    pub points: Vec<ThermoPoint>,
    pub missing_temperatures: Vec<f64>,
}

impl CompoundSeries {
    pub fn point_at(&self, T: f64) -> Option<&ThermoPoint> {
        self.points.iter().find(|p| p.T == T)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub t_low: f64,
    pub t_high: f64,
    pub record_id: u64,
    pub record_formula: String,
    pub phase: Phase,
    pub reliability_class: u8,
    pub source: SegmentSource,
}

impl From<&TemperatureSegment> for SegmentSummary {
    fn from(s: &TemperatureSegment) -> Self {
        Self {
            t_low: s.t_low,
            t_high: s.t_high,
            record_id: s.record.id,
            record_formula: s.record.formula.clone(),
            phase: s.record.phase,
            reliability_class: s.record.reliability_class,
            source: s.source.clone(),
        }
    }
}

/// how the records of one compound were found and chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundSelection {
    pub formula: String,
    pub found: bool,
    pub rows_fetched: usize,
    pub candidate_count: usize,
    pub statistics: Vec<StageStatistics>,
    pub segments: Vec<SegmentSummary>,
    pub split_points: Vec<f64>,
}

impl CompoundSelection {
    /// row ids behind the segments, merged records expanded
    pub fn chosen_record_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .segments
            .iter()
            .flat_map(|s| match &s.source {
                SegmentSource::Merged { record_ids } => record_ids.clone(),
                _ => vec![s.record_id],
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReactionData {
    pub equation: Option<String>,
    pub temperatures: Vec<f64>,
    /// empty for a pure property query
    pub reaction_points: Vec<ReactionPoint>,
    /// one series per resolved compound, in request order
    pub compounds: Vec<CompoundSeries>,
    pub selections: Vec<CompoundSelection>,
    pub warnings: Vec<ThermoWarning>,
    pub missing_compounds: Vec<String>,
    pub properties: Vec<Property>,
}

/// one (compound or reaction, T) line of the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// formula of a compound, or the equation for reaction rows
    pub subject: String,
    pub T: f64,
    pub Cp: Option<f64>,
    pub H: Option<f64>,
    pub S: Option<f64>,
    pub G: Option<f64>,
    pub dH: Option<f64>,
    pub dS: Option<f64>,
    pub dG: Option<f64>,
    pub K: Option<f64>,
    pub in_range: bool,
    pub confidence: Option<f64>,
}

impl ResultRow {
    fn value(&self, property: Property) -> Option<f64> {
        match property {
            Property::Cp => self.Cp,
            Property::H => self.H,
            Property::S => self.S,
            Property::G => self.G,
            Property::DeltaH => self.dH,
            Property::DeltaS => self.dS,
            Property::DeltaG => self.dG,
            Property::K => self.K,
        }
    }
}

impl AggregatedReactionData {
    pub fn reaction_point_at(&self, T: f64) -> Option<&ReactionPoint> {
        self.reaction_points.iter().find(|p| p.T == T)
    }

    pub fn series(&self, formula: &str) -> Option<&CompoundSeries> {
        self.compounds.iter().find(|s| s.formula == formula)
    }

    pub fn selection(&self, formula: &str) -> Option<&CompoundSelection> {
        self.selections.iter().find(|s| s.formula == formula)
    }

    /// compound rows first, then reaction rows; only kinds with a requested property
    pub fn to_rows(&self) -> Vec<ResultRow> {
        let wants_compound = self.properties.iter().any(|p| !p.is_reaction_property());
        let wants_reaction = self.properties.iter().any(|p| p.is_reaction_property());
        let mut rows = Vec::new();
        if wants_compound {
            for series in &self.compounds {
                for p in &series.points {
                    rows.push(ResultRow {
                        subject: series.formula.clone(),
                        T: p.T,
                        Cp: Some(p.Cp),
                        H: Some(p.H),
                        S: Some(p.S),
                        G: Some(p.G),
                        dH: None,
                        dS: None,
                        dG: None,
                        K: None,
                        in_range: p.in_range,
                        confidence: None,
                    });
                }
            }
        }
        if wants_reaction {
            let subject = self.equation.clone().unwrap_or_else(|| "reaction".to_string());
            for p in &self.reaction_points {
                rows.push(ResultRow {
                    subject: subject.clone(),
                    T: p.T,
                    Cp: None,
                    H: None,
                    S: None,
                    G: None,
                    dH: p.dH,
                    dS: p.dS,
                    dG: p.dG,
                    K: p.K,
                    in_range: !p.extrapolated,
                    confidence: Some(p.confidence),
                });
            }
        }
        rows
    }

    /// table of the requested properties
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        let mut header = vec![Cell::new("subject"), Cell::new("T, K")];
        header.extend(self.properties.iter().map(|p| Cell::new(p.header())));
        header.push(Cell::new("note"));
        table.add_row(Row::new(header));
        for row in self.to_rows() {
            let is_reaction = row.confidence.is_some();
            let mut cells = vec![Cell::new(&row.subject), Cell::new(&format!("{:.2}", row.T))];
            for &p in &self.properties {
                let text = if p.is_reaction_property() != is_reaction {
                    String::new()
                } else {
                    match row.value(p) {
                        Some(v) if p == Property::K => format!("{:.4e}", v),
                        Some(v) => format!("{:.3}", v),
                        None => "-".to_string(),
                    }
                };
                cells.push(Cell::new(&text));
            }
            let note = match (row.in_range, row.confidence) {
                (false, _) => "extrapolated".to_string(),
                (true, Some(c)) if c < 1.0 => format!("partial {:.0}%", c * 100.0),
                _ => String::new(),
            };
            cells.push(Cell::new(&note));
            table.add_row(Row::new(cells));
        }
        table
    }

    pub fn pretty_print(&self) {
        if let Some(eq) = &self.equation {
            println!("__________{}__________", eq);
        }
        self.table().printstd();
        if !self.missing_compounds.is_empty() {
            println!("not found: {}", self.missing_compounds.join(", "));
        }
        for w in &self.warnings {
            println!(
                "warning [{:?}] {}: {}",
                w.kind,
                w.compound.as_deref().unwrap_or("reaction"),
                w.message
            );
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(properties: Vec<Property>) -> AggregatedReactionData {
        let point = |T: f64| ThermoPoint {
            T,
            Cp: 75.3,
            H: -285_000.0,
            S: 70.0,
            G: -285_000.0 - T * 70.0,
            in_range: true,
        };
        AggregatedReactionData {
            equation: Some("H2O -> H2O".to_string()),
            temperatures: vec![300.0, 350.0],
            reaction_points: vec![ReactionPoint {
                T: 300.0,
                dH: Some(0.0),
                dS: Some(0.0),
                dG: Some(0.0),
                K: Some(1.0),
                log10_K: Some(0.0),
                confidence: 1.0,
                extrapolated: false,
                missing: vec![],
            }],
            compounds: vec![CompoundSeries {
                formula: "H2O".to_string(),
                points: vec![point(300.0), point(350.0)],
                missing_temperatures: vec![],
            }],
            selections: vec![CompoundSelection {
                formula: "H2O".to_string(),
                found: true,
                rows_fetched: 4,
                candidate_count: 2,
                statistics: vec![],
                segments: vec![SegmentSummary {
                    t_low: 273.15,
                    t_high: 373.15,
                    record_id: 2,
                    record_formula: "H2O".to_string(),
                    phase: Phase::Liquid,
                    reliability_class: 1,
                    source: SegmentSource::Merged {
                        record_ids: vec![2, 7],
                    },
                }],
                split_points: vec![],
            }],
            warnings: vec![],
            missing_compounds: vec![],
            properties,
        }
    }

    #[test]
    fn test_rows_follow_requested_properties() {
        assert_eq!(data(Property::ALL.to_vec()).to_rows().len(), 3);
        let only_compound = data(vec![Property::Cp, Property::G]).to_rows();
        assert_eq!(only_compound.len(), 2);
        assert!(only_compound.iter().all(|r| r.subject == "H2O"));
        let only_reaction = data(vec![Property::K]).to_rows();
        assert_eq!(only_reaction.len(), 1);
        assert_eq!(only_reaction[0].K, Some(1.0));
    }

    #[test]
    fn test_table_shape() {
        let table = data(vec![Property::Cp, Property::DeltaG]).table();
        // header + 2 compound rows + 1 reaction row
        assert_eq!(table.len(), 4);
        assert_eq!(table.get_row(0).unwrap().len(), 5);
    }

    #[test]
    fn test_lookup_and_json() {
        let d = data(Property::ALL.to_vec());
        assert_eq!(d.series("H2O").unwrap().point_at(350.0).unwrap().Cp, 75.3);
        assert!(d.reaction_point_at(300.0).is_some());
        assert_eq!(d.selection("H2O").unwrap().chosen_record_ids(), vec![2, 7]);
        let json = d.to_json().unwrap();
        let back: AggregatedReactionData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.compounds[0].points.len(), 2);
    }
}

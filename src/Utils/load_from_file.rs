use crate::Thermodynamics::ChemReaction::reaction_request::ReactionRequest;
use crate::Thermodynamics::DBhandlers::compound_record::CompoundRecord;
use crate::Thermodynamics::thermo_errors::{StoreError, ThermoError};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Parses JSON text; on failure logs the line and column of the error together
/// with the offending line and a pointer to the column.
pub fn parse_json_with_context<T: DeserializeOwned>(text: &str, source: &str) -> Result<T, String> {
    match serde_json::from_str::<T>(text) {
        Ok(data) => Ok(data),
        Err(e) => {
            let error_line = e.line();
            let error_column = e.column();
            let error_msg = format!(
                "Error parsing '{}' at line {}, column {}: {}",
                source, error_line, error_column, e
            );
            error!("{}", error_msg);
            // serde_json lines are 1-based
            if let Some(problem_line) = text.lines().nth(error_line.saturating_sub(1)) {
                error!("Problematic line: {}", problem_line);
                if error_column >= 1 && error_column <= problem_line.len() + 1 {
                    let pointer = " ".repeat(error_column - 1) + "^";
                    error!("{}", pointer);
                }
            }
            Err(error_msg)
        }
    }
}

/// Reads the reference dataset: a JSON array of compound records.
/// Rows that cannot be decoded or fail validation are skipped with a warning;
/// a file that is not a JSON array at all is an error.
pub fn load_compound_records(file_name: impl AsRef<Path>) -> Result<Vec<CompoundRecord>, StoreError> {
    let path = file_name.as_ref();
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rows: Vec<Value> =
        parse_json_with_context(&text, &path.display().to_string()).map_err(StoreError::Parse)?;

    let total = rows.len();
    let mut records = Vec::with_capacity(total);
    for (i, row) in rows.into_iter().enumerate() {
        let record: CompoundRecord = match serde_json::from_value(row) {
            Ok(record) => record,
            Err(e) => {
                warn!("row {} of '{}' skipped: {}", i, path.display(), e);
                continue;
            }
        };
        match record.validate() {
            Ok(()) => records.push(record),
            Err(reason) => warn!("row {} of '{}' skipped: {}", i, path.display(), reason),
        }
    }
    info!(
        "Successfully parsed {} of {} compound records from file '{}'",
        records.len(),
        total,
        path.display()
    );
    Ok(records)
}

/// Reads a structured reaction request from a JSON file
pub fn load_reaction_request(file_name: impl AsRef<Path>) -> Result<ReactionRequest, ThermoError> {
    let path = file_name.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| ThermoError::DatasetLoad(format!("'{}': {}", path.display(), e)))?;
    parse_json_with_context(&text, &path.display().to_string()).map_err(ThermoError::DatasetLoad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_skips_invalid_rows() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
  {{"id": 1, "formula": "Zn", "phase": "solid", "t_min": 298.15, "t_max": 692.73,
    "h298": 0.0, "s298": 41.63, "f1": 20.74, "f2": 12.51, "reliability_class": 1}},
  {{"id": 2, "formula": "Zn", "phase": "plasma", "h298": 0.0, "s298": 1.0, "reliability_class": 1}},
  {{"id": 3, "formula": "S", "phase": "solid", "t_min": 500.0, "t_max": 300.0,
    "h298": 0.0, "s298": 32.0, "reliability_class": 1}}
]"#
        )
        .unwrap();
        let records = load_compound_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].formula, "Zn");
    }

    #[test]
    fn test_load_reports_syntax_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[\n  {{\"id\": 1,, }}\n]").unwrap();
        match load_compound_records(file.path()) {
            Err(StoreError::Parse(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_compound_records("/nonexistent/data.json").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_load_request() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"compounds": ["Zn", "S", "ZnS"], "temperature_range": [298.0, 1000.0],
                "reaction_equation": "Zn + S -> ZnS"}}"#
        )
        .unwrap();
        let request = load_reaction_request(file.path()).unwrap();
        assert_eq!(request.compounds.len(), 3);
        assert_eq!(request.temperature_range, [298.0, 1000.0]);
    }
}

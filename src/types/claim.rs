//! Raw claim record as received from the client

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// A single scalar value of a raw claim field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum Cell {
    /// Explicit `null`
    Missing,
    /// String value, kept verbatim
    Text(String),
    /// Numeric value (booleans become 1.0 / 0.0)
    Number(f64),
}

impl Cell {
    /// Textual form used by date parsing and categorical encoding
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(n.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Bool(b) => Cell::Number(if b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::String(s) => Cell::Text(s),
            // Nested structures are not meaningful features; keep their JSON text
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// Mapping of feature name to raw value for one claim.
///
/// Built fresh for every request and consumed by the feature extractor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ClaimRecord {
    fields: HashMap<String, Cell>,
}

impl ClaimRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object
    pub fn from_json(object: &serde_json::Map<String, Value>) -> Self {
        Self {
            fields: object
                .iter()
                .map(|(name, value)| (name.clone(), Cell::from(value.clone())))
                .collect(),
        }
    }

    /// Builder-style insert, convenient for constructing records in code
    pub fn with(mut self, name: &str, cell: impl Into<Cell>) -> Self {
        self.insert(name, cell.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, cell: Cell) {
        self.fields.insert(name.into(), cell);
    }

    pub fn set_number(&mut self, name: impl Into<String>, value: f64) {
        self.insert(name, Cell::Number(value));
    }

    /// Remove a field; absence is not an error
    pub fn remove(&mut self, name: &str) -> Option<Cell> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(name, cell)| (name.as_str(), cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_json_scalars() {
        let record: ClaimRecord = serde_json::from_str(
            r#"{"Provider": "PRV51001", "InscClaimAmtReimbursed": 100.5,
                "OtherPhysician": null, "RenalDiseaseIndicator": true}"#,
        )
        .unwrap();

        assert_eq!(record.len(), 4);
        assert_eq!(record.get("Provider"), Some(&Cell::Text("PRV51001".into())));
        assert_eq!(record.get("InscClaimAmtReimbursed"), Some(&Cell::Number(100.5)));
        assert_eq!(record.get("OtherPhysician"), Some(&Cell::Missing));
        assert_eq!(record.get("RenalDiseaseIndicator"), Some(&Cell::Number(1.0)));
        assert!(record.get("ClaimID").is_none());
    }

    #[test]
    fn test_remove_is_tolerant() {
        let mut record = ClaimRecord::new().with("BeneID", "BENE11001");
        assert!(record.remove("BeneID").is_some());
        assert!(record.remove("BeneID").is_none());
        assert!(record.is_empty());
    }
}

//! Categorical encoding of identifier fields into small integer codes

use crate::types::claim::Cell;
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

/// Code assigned to null or unknown categories
pub const UNKNOWN_CODE: i64 = -1;

/// Maps the value of a categorical field to an integer code.
pub trait CategoricalEncoder: Send + Sync {
    fn encode(&self, field: &str, value: &Cell) -> i64;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Category codes for one column: each value's index among the column's
/// sorted distinct values, `-1` for nulls.
pub fn column_codes(values: &[Cell]) -> Vec<i64> {
    let categories: BTreeSet<String> = values.iter().filter_map(Cell::as_text).collect();

    values
        .iter()
        .map(|value| {
            value
                .as_text()
                .and_then(|text| categories.iter().position(|c| *c == text))
                .map(|index| index as i64)
                .unwrap_or(UNKNOWN_CODE)
        })
        .collect()
}

/// Encodes each request on its own, so the category set is the single value
/// being encoded. Every present value gets code 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerRecordEncoder;

impl CategoricalEncoder for PerRecordEncoder {
    fn encode(&self, _field: &str, value: &Cell) -> i64 {
        column_codes(std::slice::from_ref(value))[0]
    }

    fn name(&self) -> &'static str {
        "per-record"
    }
}

/// Encoder backed by the category codes persisted at training time.
///
/// Fields with no mapping fall back to per-record encoding.
#[derive(Debug, Clone, Default)]
pub struct MappedEncoder {
    mappings: HashMap<String, HashMap<String, i64>>,
    fallback: PerRecordEncoder,
}

impl MappedEncoder {
    pub fn new(mappings: HashMap<String, HashMap<String, i64>>) -> Self {
        Self {
            mappings,
            fallback: PerRecordEncoder,
        }
    }

    /// Load `{"<field>": {"<value>": <code>, ...}, ...}` from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read categorical mappings from {:?}", path))?;
        let mappings: HashMap<String, HashMap<String, i64>> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse categorical mappings in {:?}", path))?;

        info!(
            path = %path.display(),
            fields = mappings.len(),
            "Loaded persisted categorical mappings"
        );

        Ok(Self::new(mappings))
    }

    pub fn field_count(&self) -> usize {
        self.mappings.len()
    }
}

impl CategoricalEncoder for MappedEncoder {
    fn encode(&self, field: &str, value: &Cell) -> i64 {
        match self.mappings.get(field) {
            Some(codes) => value
                .as_text()
                .and_then(|text| codes.get(&text).copied())
                .unwrap_or(UNKNOWN_CODE),
            None => self.fallback.encode(field, value),
        }
    }

    fn name(&self) -> &'static str {
        "mapped"
    }
}

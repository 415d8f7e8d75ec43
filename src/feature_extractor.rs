//! Feature reconstruction for claim fraud model inference.
//!
//! Turns a loosely specified claim record into the fixed-order numeric
//! vector the trained classifier expects. The steps mirror the
//! preprocessing applied to the training data and run in a fixed order:
//! date aliasing, numeric coercion, date decomposition, categorical
//! encoding, numeric default-fill, column pruning, schema alignment and
//! width validation.

use crate::encoder::{CategoricalEncoder, PerRecordEncoder};
use crate::error::{PredictError, Result};
use crate::types::claim::{Cell, ClaimRecord};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::debug;

/// Width of the feature vector the classifier was trained on
pub const EXPECTED_FEATURE_COUNT: usize = 20;

/// Monetary fields coerced to floating point
pub const NUMERIC_FIELDS: [&str; 2] = ["InscClaimAmtReimbursed", "DeductibleAmtPaid"];

/// Date fields decomposed into day / month / year columns
pub const DATE_FIELDS: [&str; 4] = ["ClaimStartDt", "ClaimEndDt", "AdmissionDt", "DischargeDt"];

/// Identifier fields replaced by categorical codes
pub const CATEGORICAL_FIELDS: [&str; 6] = [
    "BeneID",
    "ClaimID",
    "Provider",
    "AttendingPhysician",
    "OperatingPhysician",
    "OtherPhysician",
];

/// Diagnosis and procedure code columns the model was not trained on
pub const UNUSED_COLUMNS: [&str; 18] = [
    "ClmAdmitDiagnosisCode",
    "DiagnosisGroupCode",
    "ClmDiagnosisCode_1",
    "ClmDiagnosisCode_2",
    "ClmDiagnosisCode_3",
    "ClmDiagnosisCode_4",
    "ClmDiagnosisCode_5",
    "ClmDiagnosisCode_6",
    "ClmDiagnosisCode_7",
    "ClmDiagnosisCode_8",
    "ClmDiagnosisCode_9",
    "ClmDiagnosisCode_10",
    "ClmProcedureCode_1",
    "ClmProcedureCode_2",
    "ClmProcedureCode_3",
    "ClmProcedureCode_4",
    "ClmProcedureCode_5",
    "ClmProcedureCode_6",
];

/// Trained feature order used when the model ships without a feature list
pub const DEFAULT_FEATURE_NAMES: [&str; EXPECTED_FEATURE_COUNT] = [
    "BeneID",
    "ClaimID",
    "Provider",
    "InscClaimAmtReimbursed",
    "AttendingPhysician",
    "OperatingPhysician",
    "OtherPhysician",
    "DeductibleAmtPaid",
    "ClaimStartDt_Day",
    "ClaimStartDt_Month",
    "ClaimStartDt_Year",
    "ClaimEndDt_Day",
    "ClaimEndDt_Month",
    "ClaimEndDt_Year",
    "AdmissionDt_Day",
    "AdmissionDt_Month",
    "AdmissionDt_Year",
    "DischargeDt_Day",
    "DischargeDt_Month",
    "DischargeDt_Year",
];

// Month-first before day-first, so "05/06/2020" is May 6th
const DATE_FORMATS: [&str; 11] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y%m%d",
    "%d-%b-%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
];

/// Year and month only; the day is taken as the 1st
const YEAR_MONTH_FORMATS: [&str; 3] = ["%Y-%m", "%Y/%m", "%Y.%m"];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a calendar date, returning `None` for anything unrecognised.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            let first_of_month = format!("{raw}-01");
            YEAR_MONTH_FORMATS.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(&first_of_month, &format!("{fmt}-%d")).ok()
            })
        })
}

/// Single-row numeric feature vector in trained-schema order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(names: Vec<String>, values: Vec<f32>) -> Self {
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Look up a column by name
    pub fn get(&self, name: &str) -> Option<f32> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| self.values[index])
    }
}

/// Feature extractor that transforms claim records into model input features.
pub struct FeatureExtractor {
    /// Ordered feature names the classifier was trained on
    feature_names: Vec<String>,
    /// Width the aligned vector must have
    expected_count: usize,
    encoder: Arc<dyn CategoricalEncoder>,
}

impl FeatureExtractor {
    /// Create an extractor for a trained schema with per-record categorical encoding.
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            expected_count: EXPECTED_FEATURE_COUNT,
            encoder: Arc::new(PerRecordEncoder),
        }
    }

    /// Extractor over the built-in 20-column claims schema
    pub fn with_default_schema() -> Self {
        Self::new(DEFAULT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect())
    }

    /// Replace the categorical encoder
    pub fn with_encoder(mut self, encoder: Arc<dyn CategoricalEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Override the width enforced by [`FeatureExtractor::validate`]
    pub fn with_expected_count(mut self, expected_count: usize) -> Self {
        self.expected_count = expected_count;
        self
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Get feature names in trained order.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn encoder_name(&self) -> &'static str {
        self.encoder.name()
    }

    /// Run the full pipeline on a raw record.
    pub fn extract(&self, raw: &ClaimRecord) -> Result<FeatureVector> {
        let mut record = raw.clone();

        self.alias_dates(&mut record);
        self.coerce_numeric(&mut record)?;
        self.decompose_dates(&mut record);
        self.encode_categoricals(&mut record);
        self.fill_numeric_defaults(&mut record);
        self.prune_unused(&mut record);

        let features = self.align(&record)?;
        self.validate(&features)?;

        debug!(
            input_fields = raw.len(),
            features = features.len(),
            "Feature vector extracted"
        );

        Ok(features)
    }

    /// Copy admission/discharge dates onto the claim start/end dates.
    pub fn alias_dates(&self, record: &mut ClaimRecord) {
        for (alias, source) in [("ClaimStartDt", "AdmissionDt"), ("ClaimEndDt", "DischargeDt")] {
            let value = record.get(source).cloned().unwrap_or_else(|| Cell::from(""));
            record.insert(alias, value);
        }
    }

    /// Parse monetary fields as floats. Nulls become 0; absent fields are
    /// left for [`FeatureExtractor::fill_numeric_defaults`].
    pub fn coerce_numeric(&self, record: &mut ClaimRecord) -> Result<()> {
        for field in NUMERIC_FIELDS {
            let value = match record.get(field) {
                None => continue,
                Some(Cell::Number(n)) => *n,
                Some(Cell::Missing) => 0.0,
                Some(Cell::Text(s)) => {
                    s.trim()
                        .parse::<f64>()
                        .map_err(|_| PredictError::TypeConversion {
                            field: field.to_string(),
                            value: s.clone(),
                        })?
                }
            };
            record.set_number(field, value);
        }
        Ok(())
    }

    /// Replace each date field by `_Day`, `_Month` and `_Year` columns (all 0
    /// when the date is missing or unparseable).
    pub fn decompose_dates(&self, record: &mut ClaimRecord) {
        for field in DATE_FIELDS {
            let date = match record.remove(field) {
                Some(Cell::Text(s)) => parse_date(&s),
                // Numbers are not read as epoch timestamps; they carry no date
                _ => None,
            };

            let (day, month, year) = date
                .map(|d| (d.day() as f64, d.month() as f64, d.year() as f64))
                .unwrap_or((0.0, 0.0, 0.0));

            record.set_number(format!("{field}_Day"), day);
            record.set_number(format!("{field}_Month"), month);
            record.set_number(format!("{field}_Year"), year);
        }
    }

    /// Replace identifier fields by categorical codes; absent fields become 0.
    pub fn encode_categoricals(&self, record: &mut ClaimRecord) {
        for field in CATEGORICAL_FIELDS {
            let code = match record.get(field) {
                Some(value) => self.encoder.encode(field, value),
                None => 0,
            };
            record.set_number(field, code as f64);
        }
    }

    /// Make sure both monetary fields exist.
    pub fn fill_numeric_defaults(&self, record: &mut ClaimRecord) {
        for field in NUMERIC_FIELDS {
            if !record.contains(field) {
                record.set_number(field, 0.0);
            }
        }
    }

    /// Drop diagnosis/procedure columns the model was not trained on.
    pub fn prune_unused(&self, record: &mut ClaimRecord) {
        for column in UNUSED_COLUMNS {
            record.remove(column);
        }
    }

    /// Lay the record out in trained-schema order. Schema columns the record
    /// lacks are 0; record columns outside the schema are dropped.
    pub fn align(&self, record: &ClaimRecord) -> Result<FeatureVector> {
        let values = self
            .feature_names
            .iter()
            .map(|name| match record.get(name) {
                None | Some(Cell::Missing) => Ok(0.0),
                Some(Cell::Number(n)) => Ok(*n as f32),
                Some(Cell::Text(s)) => Err(PredictError::NonNumericFeature {
                    column: name.clone(),
                    value: s.clone(),
                }),
            })
            .collect::<Result<Vec<f32>>>()?;

        Ok(FeatureVector::new(self.feature_names.clone(), values))
    }

    /// Check the vector width against the trained width.
    pub fn validate(&self, features: &FeatureVector) -> Result<()> {
        if features.len() != self.expected_count {
            return Err(PredictError::FeatureCountMismatch {
                expected: self.expected_count,
                actual: features.len(),
            });
        }
        Ok(())
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::with_default_schema()
    }
}

//! Classifier inference and fraud labelling

use crate::config::AppConfig;
use crate::encoder::{CategoricalEncoder, MappedEncoder, PerRecordEncoder};
use crate::error::PredictError;
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::models::loader::{FeatureInfo, LoadedModel, ModelLoader};
use crate::types::claim::ClaimRecord;
use crate::types::prediction::Prediction;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A trained binary classifier.
pub trait Classifier: Send + Sync {
    /// Feature names in the order the model was trained on
    fn feature_names(&self) -> &[String];

    /// Per-class probabilities for a single row, indexed by class id
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f64>>;
}

/// Probability mass of the positive (fraud) class
pub fn positive_class_probability(class_probs: &[f64]) -> Result<f64> {
    match class_probs {
        [] => anyhow::bail!("Classifier returned no probabilities"),
        [only] => Ok(*only),
        [_, fraud, ..] => Ok(*fraud),
    }
}

/// Try the named probability output first, then every other non-label
/// output in order; the first one that extracts wins.
pub(crate) fn first_extracted<N: AsRef<str>, T>(
    candidates: impl IntoIterator<Item = (N, T)>,
    output_name: &str,
    mut extract: impl FnMut(&str, &T) -> Result<Vec<f64>>,
) -> Option<Vec<f64>> {
    let candidates: Vec<(N, T)> = candidates.into_iter().collect();

    let named = candidates
        .iter()
        .filter(|(name, _)| name.as_ref() == output_name);
    let others = candidates.iter().filter(|(name, _)| {
        let name = name.as_ref();
        name != output_name && !name.contains("label")
    });

    named
        .chain(others)
        .find_map(|(name, output)| extract(name.as_ref(), output).ok())
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    /// Sessions need exclusive access to run
    model: Mutex<LoadedModel>,
    feature_names: Vec<String>,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel, feature_names: Vec<String>) -> Self {
        Self {
            model: Mutex::new(model),
            feature_names,
        }
    }

    /// Load the model and its trained feature list from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.model.onnx_threads)?;
        let model = loader.load_model(&config.model.model_path, "xgboost")?;
        let info = FeatureInfo::load_or_default(&config.model.feature_info_path)?;
        Ok(Self::new(model, info.feature_names))
    }

    /// Extract class probabilities from model output.
    /// Handles both tensor outputs (XGBoost, Random Forest) and seq(map)
    /// outputs (CatBoost, LightGBM).
    fn extract_probabilities(
        &self,
        outputs: &ort::session::SessionOutputs,
        output_name: &str,
        model_name: &str,
    ) -> Result<Vec<f64>> {
        first_extracted(outputs.iter(), output_name, |name, output| {
            Self::extract_output(output, name, model_name)
        })
        .ok_or_else(|| anyhow::anyhow!("Model {} produced no probability output", model_name))
    }

    /// Probabilities from a single output, tensor or seq(map)
    fn extract_output(
        output: &ort::value::DynValue,
        name: &str,
        model_name: &str,
    ) -> Result<Vec<f64>> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let probs = Self::first_row(shape, data);
            debug!(model = %model_name, output = %name, probs = ?probs, "Extracted from tensor");
            return Ok(probs);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return Self::extract_from_sequence_map(output, model_name);
        }

        anyhow::bail!("Output {} holds no probabilities", name)
    }

    /// Extract probabilities from seq(map(int64, float)) format
    fn extract_from_sequence_map(
        output: &ort::value::DynValue,
        model_name: &str,
    ) -> Result<Vec<f64>> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let map_value = maps
            .first()
            .ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;

        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
        let classes = kv_pairs
            .iter()
            .map(|(class_id, _)| *class_id)
            .max()
            .ok_or_else(|| anyhow::anyhow!("No probability found in map"))?;

        let mut probs = vec![0.0; classes.max(0) as usize + 1];
        for (class_id, prob) in &kv_pairs {
            if *class_id >= 0 {
                probs[*class_id as usize] = *prob as f64;
            }
        }

        debug!(model = %model_name, probs = ?probs, "Extracted from seq(map)");
        Ok(probs)
    }

    /// Class probabilities of the single input row
    fn first_row(shape: &ort::tensor::Shape, data: &[f32]) -> Vec<f64> {
        let dims: Vec<i64> = shape.iter().copied().collect();

        let width = match dims.as_slice() {
            [_batch, classes] => (*classes).max(0) as usize,
            _ => data.len(),
        };

        data.iter().take(width).map(|&p| p as f64).collect()
    }
}

impl Classifier for OnnxClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f64>> {
        use ort::value::Tensor;

        let mut model = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let model = &mut *model;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let outputs = model
            .session
            .run(ort::inputs![&model.input_name => input_tensor])?;

        self.extract_probabilities(&outputs, &model.output_name, &model.name)
    }
}

/// Feature transformer plus classifier: raw claim in, labelled probability out
pub struct Predictor {
    extractor: FeatureExtractor,
    classifier: Arc<dyn Classifier>,
    /// Probabilities strictly above this are labelled fraud
    threshold: f64,
}

impl Predictor {
    /// Build a predictor over a classifier, aligning to its trained feature names
    pub fn new(classifier: Arc<dyn Classifier>, threshold: f64) -> Self {
        let extractor = FeatureExtractor::new(classifier.feature_names().to_vec());
        Self {
            extractor,
            classifier,
            threshold,
        }
    }

    /// Load the classifier and encoder described by the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let classifier = Arc::new(OnnxClassifier::from_config(config)?);

        let encoder: Arc<dyn CategoricalEncoder> = match &config.model.categorical_mappings {
            Some(path) => Arc::new(
                MappedEncoder::from_path(path).context("Failed to load categorical mappings")?,
            ),
            None => Arc::new(PerRecordEncoder),
        };

        let predictor = Self::new(classifier, config.detection.threshold).with_extractor(|e| {
            e.with_encoder(encoder)
                .with_expected_count(config.detection.expected_feature_count)
        });

        info!(
            features = predictor.extractor.feature_count(),
            encoder = predictor.extractor.encoder_name(),
            threshold = predictor.threshold,
            "Predictor initialized"
        );

        Ok(predictor)
    }

    /// Reconfigure the feature extractor
    pub fn with_extractor(
        mut self,
        configure: impl FnOnce(FeatureExtractor) -> FeatureExtractor,
    ) -> Self {
        self.extractor = configure(self.extractor);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Transform a raw claim and score it.
    pub fn predict(&self, raw: &ClaimRecord) -> Result<Prediction, PredictError> {
        let features = self.extractor.extract(raw)?;
        let probability = self.score(&features)?;

        Ok(Prediction::new(probability, self.threshold))
    }

    /// Fraud probability for an aligned feature vector
    pub fn score(&self, features: &FeatureVector) -> Result<f64, PredictError> {
        self.classifier
            .predict_proba(features.values())
            .and_then(|probs| positive_class_probability(&probs))
            .map_err(PredictError::Inference)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::feature_extractor::DEFAULT_FEATURE_NAMES;

    /// Classifier returning fixed probabilities and recording input widths
    pub(crate) struct StubClassifier {
        pub feature_names: Vec<String>,
        pub fraud_probability: f64,
        pub seen_widths: Mutex<Vec<usize>>,
    }

    impl StubClassifier {
        pub(crate) fn new(fraud_probability: f64) -> Self {
            Self {
                feature_names: DEFAULT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                fraud_probability,
                seen_widths: Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for StubClassifier {
        fn feature_names(&self) -> &[String] {
            &self.feature_names
        }

        fn predict_proba(&self, features: &[f32]) -> Result<Vec<f64>> {
            self.seen_widths.lock().unwrap().push(features.len());
            Ok(vec![1.0 - self.fraud_probability, self.fraud_probability])
        }
    }

    struct FailingClassifier(Vec<String>);

    impl Classifier for FailingClassifier {
        fn feature_names(&self) -> &[String] {
            &self.0
        }

        fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f64>> {
            anyhow::bail!("session unavailable")
        }
    }

    fn scenario() -> ClaimRecord {
        ClaimRecord::new()
            .with("InscClaimAmtReimbursed", "100.5")
            .with("DeductibleAmtPaid", "0")
            .with("AdmissionDt", "2021-01-10")
            .with("DischargeDt", "2021-01-15")
    }

    #[test]
    fn test_positive_class_selection() {
        assert_eq!(positive_class_probability(&[0.3, 0.7]).unwrap(), 0.7);
        assert_eq!(positive_class_probability(&[0.42]).unwrap(), 0.42);
        assert!(positive_class_probability(&[]).is_err());
    }

    fn from_vec(_name: &str, output: &Vec<f64>) -> Result<Vec<f64>> {
        if output.is_empty() {
            anyhow::bail!("not a probability map")
        }
        Ok(output.clone())
    }

    #[test]
    fn test_named_output_preferred() {
        let outputs = vec![("variable", vec![0.5, 0.5]), ("probabilities", vec![0.3, 0.7])];
        assert_eq!(
            first_extracted(outputs, "probabilities", from_vec),
            Some(vec![0.3, 0.7])
        );
    }

    #[test]
    fn test_failed_named_output_falls_through() {
        let outputs = vec![
            ("output_label", vec![1.0]),
            ("probabilities", Vec::new()),
            ("output_probability", vec![0.1, 0.9]),
        ];
        assert_eq!(
            first_extracted(outputs, "probabilities", from_vec),
            Some(vec![0.1, 0.9])
        );

        let only_labels = vec![("label", vec![1.0]), ("probabilities", Vec::new())];
        assert_eq!(first_extracted(only_labels, "probabilities", from_vec), None);
    }

    #[test]
    fn test_predict_scenario() {
        let stub = Arc::new(StubClassifier::new(0.83));
        let predictor = Predictor::new(stub.clone(), 0.6);

        let prediction = predictor.predict(&scenario()).unwrap();
        assert!(prediction.is_fraud());
        assert_eq!(prediction.probability, 0.83);
        assert_eq!(*stub.seen_widths.lock().unwrap(), vec![20]);
    }

    #[test]
    fn test_threshold_boundary() {
        let at = Predictor::new(Arc::new(StubClassifier::new(0.6)), 0.6);
        assert!(!at.predict(&scenario()).unwrap().is_fraud());

        let above = Predictor::new(Arc::new(StubClassifier::new(0.6000001)), 0.6);
        assert!(above.predict(&scenario()).unwrap().is_fraud());
    }

    #[test]
    fn test_predict_is_idempotent() {
        let predictor = Predictor::new(Arc::new(StubClassifier::new(0.2)), 0.6);
        let record = scenario().with("Provider", "PRV51001").with("BeneID", "BENE11001");

        let first = predictor.predict(&record).unwrap();
        let second = predictor.predict(&record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inference_failure_is_reported() {
        let names = DEFAULT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let predictor = Predictor::new(Arc::new(FailingClassifier(names)), 0.6);

        let err = predictor.predict(&scenario()).unwrap_err();
        assert!(matches!(err, PredictError::Inference(_)));
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("session unavailable"));
    }

    #[test]
    fn test_schema_width_mismatch() {
        let mut stub = StubClassifier::new(0.9);
        stub.feature_names.truncate(19);
        let predictor = Predictor::new(Arc::new(stub), 0.6);

        let err = predictor.predict(&scenario()).unwrap_err();
        assert!(matches!(
            err,
            PredictError::FeatureCountMismatch {
                expected: 20,
                actual: 19
            }
        ));
        assert_eq!(err.status_code(), 400);
    }
}

//! ONNX model loader

use crate::feature_extractor::DEFAULT_FEATURE_NAMES;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
}

/// Feature list exported next to the model at training time
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureInfo {
    pub feature_names: Vec<String>,
}

impl FeatureInfo {
    /// Read the trained feature order from a JSON sidecar
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature info from {:?}", path))?;
        let info: FeatureInfo = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse feature info in {:?}", path))?;

        if info.feature_names.is_empty() {
            anyhow::bail!("Feature info {:?} lists no features", path);
        }
        Ok(info)
    }

    /// Read the sidecar if present, otherwise fall back to the claims schema
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let info = Self::from_path(path)?;
            info!(
                path = %path.display(),
                features = info.feature_names.len(),
                "Loaded trained feature names"
            );
            Ok(info)
        } else {
            warn!(
                path = %path.display(),
                "Feature info not found, using built-in claims schema"
            );
            Ok(Self::default())
        }
    }
}

impl Default for FeatureInfo {
    fn default() -> Self {
        Self {
            feature_names: DEFAULT_FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // Classifier exports carry a label output and a probability output
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

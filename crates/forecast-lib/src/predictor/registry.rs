//! Model registry
//!
//! Holds the mandatory primary model and any variant models discovered by
//! filename in a model directory. Built once at startup, read-only after.

use super::features::FeatureMatrix;
use super::PredictionModel;
use crate::error::{InferenceError, ModelLoadError};
use crate::models::RESERVED_FIELDS;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Identifier reported for the primary model
pub const PRIMARY_MODEL: &str = "primary";

/// Model locations
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the primary (total sales) model
    #[serde(default = "default_primary_path")]
    pub primary_path: PathBuf,

    /// Directory scanned for variant models
    #[serde(default = "default_variant_dir")]
    pub variant_dir: PathBuf,

    /// Filename prefix identifying variant models
    #[serde(default = "default_variant_prefix")]
    pub variant_prefix: String,

    /// Filename extension of variant models, without the dot
    #[serde(default = "default_variant_extension")]
    pub variant_extension: String,
}

fn default_primary_path() -> PathBuf {
    std::env::var("MODEL_PATH")
        .unwrap_or_else(|_| "models/stack_sales_model.onnx".to_string())
        .into()
}

fn default_variant_dir() -> PathBuf {
    std::env::var("MODEL_DIR")
        .unwrap_or_else(|_| "models/onnx".to_string())
        .into()
}

fn default_variant_prefix() -> String {
    "sales_forecast_".to_string()
}

fn default_variant_extension() -> String {
    "onnx".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary_path: default_primary_path(),
            variant_dir: default_variant_dir(),
            variant_prefix: default_variant_prefix(),
            variant_extension: default_variant_extension(),
        }
    }
}

impl ModelConfig {
    pub fn variant_pattern(&self) -> VariantPattern {
        VariantPattern::new(&self.variant_prefix, &self.variant_extension)
    }
}

/// Trait for turning a model file into a callable model
pub trait ModelLoader: Send + Sync {
    fn load(&self, identifier: &str, path: &Path) -> Result<Arc<dyn PredictionModel>, ModelLoadError>;
}

/// Filename convention `<prefix><identifier>.<extension>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPattern {
    prefix: String,
    extension: String,
}

impl VariantPattern {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Extract the variant identifier from a path, if it matches
    pub fn identifier_for(&self, path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != self.extension {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        stem.strip_prefix(self.prefix.as_str()).map(str::to_string)
    }
}

/// Load the mandatory primary model
pub fn load_primary(
    loader: &dyn ModelLoader,
    path: &Path,
) -> Result<Arc<dyn PredictionModel>, ModelLoadError> {
    let model = loader.load(PRIMARY_MODEL, path)?;
    info!(event = "model_loaded", model = PRIMARY_MODEL, path = %path.display(), "Loaded primary model");
    Ok(model)
}

/// Scan `dir` for files matching `pattern` and load each as a variant.
///
/// A missing directory yields no variants. Files whose identifier is empty or
/// would shadow a response field are skipped.
pub fn load_variants(
    loader: &dyn ModelLoader,
    dir: &Path,
    pattern: &VariantPattern,
) -> Result<BTreeMap<String, Arc<dyn PredictionModel>>, ModelLoadError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Variant model directory not found, no variants loaded");
            return Ok(BTreeMap::new());
        }
        Err(source) => {
            return Err(ModelLoadError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ModelLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut variants = BTreeMap::new();
    for path in paths {
        let Some(identifier) = pattern.identifier_for(&path) else {
            continue;
        };
        if identifier.is_empty() {
            warn!(event = "variant_skipped", path = %path.display(), "Skipping variant model with empty identifier");
            continue;
        }
        if RESERVED_FIELDS.contains(&identifier.as_str()) {
            warn!(
                event = "variant_skipped",
                path = %path.display(),
                identifier = %identifier,
                "Skipping variant model with reserved identifier"
            );
            continue;
        }
        let model = loader.load(&identifier, &path)?;
        info!(event = "model_loaded", model = %identifier, path = %path.display(), "Loaded variant model");
        variants.insert(identifier, model);
    }

    Ok(variants)
}

/// Run `model` over `matrix`, enforcing the input and output shape contract
pub fn predict(
    model: &dyn PredictionModel,
    matrix: &FeatureMatrix,
) -> Result<Vec<f32>, InferenceError> {
    if matrix.ncols() != model.input_feature_count() {
        return Err(InferenceError::new(
            model.identifier(),
            format!(
                "feature matrix has {} columns, model expects {}",
                matrix.ncols(),
                model.input_feature_count()
            ),
        ));
    }

    let values = model.predict(matrix)?;
    if values.len() != matrix.nrows() {
        return Err(InferenceError::new(
            model.identifier(),
            format!(
                "model returned {} values for {} rows",
                values.len(),
                matrix.nrows()
            ),
        ));
    }
    Ok(values)
}

/// Immutable set of loaded models
#[derive(Clone)]
pub struct ModelRegistry {
    primary: Arc<dyn PredictionModel>,
    variants: BTreeMap<String, Arc<dyn PredictionModel>>,
}

impl ModelRegistry {
    pub fn new(
        primary: Arc<dyn PredictionModel>,
        variants: BTreeMap<String, Arc<dyn PredictionModel>>,
    ) -> Self {
        Self { primary, variants }
    }

    /// Load the primary model and discover variants
    pub fn load(config: &ModelConfig, loader: &dyn ModelLoader) -> Result<Self, ModelLoadError> {
        let primary = load_primary(loader, &config.primary_path)?;
        let variants = load_variants(loader, &config.variant_dir, &config.variant_pattern())?;
        Ok(Self::new(primary, variants))
    }

    pub fn primary(&self) -> &Arc<dyn PredictionModel> {
        &self.primary
    }

    /// Variant models in ascending identifier order
    pub fn variants(&self) -> &BTreeMap<String, Arc<dyn PredictionModel>> {
        &self.variants
    }

    pub fn variant_ids(&self) -> Vec<String> {
        self.variants.keys().cloned().collect()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("primary", &self.primary.identifier())
            .field("variants", &self.variants.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::FEATURE_COUNT;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ConstModel {
        id: String,
        value: f32,
        features: usize,
    }

    impl PredictionModel for ConstModel {
        fn identifier(&self) -> &str {
            &self.id
        }
        fn input_feature_count(&self) -> usize {
            self.features
        }
        fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![self.value; matrix.nrows()])
        }
    }

    /// Records the identifiers it was asked to load
    #[derive(Default)]
    struct RecordingLoader {
        loaded: Mutex<Vec<(String, PathBuf)>>,
    }

    impl ModelLoader for RecordingLoader {
        fn load(&self, identifier: &str, path: &Path) -> Result<Arc<dyn PredictionModel>, ModelLoadError> {
            self.loaded
                .lock()
                .unwrap()
                .push((identifier.to_string(), path.to_path_buf()));
            Ok(Arc::new(ConstModel {
                id: identifier.to_string(),
                value: 1.0,
                features: FEATURE_COUNT,
            }))
        }
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }

    fn pattern() -> VariantPattern {
        VariantPattern::new("sales_forecast_", "onnx")
    }

    fn matrix(rows: usize, cols: usize) -> FeatureMatrix {
        FeatureMatrix::from_array(tract_onnx::prelude::tract_ndarray::Array2::zeros((rows, cols)))
    }

    #[test]
    fn test_identifier_extraction() {
        let p = pattern();
        assert_eq!(
            p.identifier_for(Path::new("/m/sales_forecast_asahi.onnx")),
            Some("asahi".to_string())
        );
        assert_eq!(p.identifier_for(Path::new("/m/sales_forecast_asahi.bin")), None);
        assert_eq!(p.identifier_for(Path::new("/m/stack_sales_model.onnx")), None);
        assert_eq!(p.identifier_for(Path::new("/m/sales_forecast_.onnx")), Some(String::new()));
    }

    #[test]
    fn test_discovers_matching_files_in_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "sales_forecast_sapporo.onnx");
        touch(&dir, "sales_forecast_asahi.onnx");
        touch(&dir, "readme.txt");
        touch(&dir, "other_model.onnx");

        let loader = RecordingLoader::default();
        let variants = load_variants(&loader, dir.path(), &pattern()).unwrap();

        assert_eq!(variants.keys().collect::<Vec<_>>(), vec!["asahi", "sapporo"]);
        let loaded = loader.loaded.lock().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, "asahi");
    }

    #[test]
    fn test_reserved_and_empty_identifiers_skipped() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "sales_forecast_total.onnx");
        touch(&dir, "sales_forecast_.onnx");
        touch(&dir, "sales_forecast_kirin.onnx");

        let variants = load_variants(&RecordingLoader::default(), dir.path(), &pattern()).unwrap();
        assert_eq!(variants.keys().collect::<Vec<_>>(), vec!["kirin"]);
    }

    #[test]
    fn test_missing_directory_yields_no_variants() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let variants = load_variants(&RecordingLoader::default(), &missing, &pattern()).unwrap();
        assert!(variants.is_empty());
    }

    #[test]
    fn test_registry_load_uses_config() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "sales_forecast_yebisu.onnx");
        let config = ModelConfig {
            primary_path: dir.path().join("stack_sales_model.onnx"),
            variant_dir: dir.path().to_path_buf(),
            variant_prefix: "sales_forecast_".to_string(),
            variant_extension: "onnx".to_string(),
        };

        let registry = ModelRegistry::load(&config, &RecordingLoader::default()).unwrap();
        assert_eq!(registry.primary().identifier(), PRIMARY_MODEL);
        assert_eq!(registry.variant_ids(), vec!["yebisu".to_string()]);
        assert_eq!(registry.variant_count(), 1);
    }

    #[test]
    fn test_variant_load_failure_propagates() {
        struct FailingLoader;
        impl ModelLoader for FailingLoader {
            fn load(&self, _identifier: &str, path: &Path) -> Result<Arc<dyn PredictionModel>, ModelLoadError> {
                Err(ModelLoadError::Invalid {
                    path: path.to_path_buf(),
                    message: "corrupt".to_string(),
                })
            }
        }

        let dir = TempDir::new().unwrap();
        touch(&dir, "sales_forecast_asahi.onnx");
        assert!(load_variants(&FailingLoader, dir.path(), &pattern()).is_err());
    }

    #[test]
    fn test_predict_rejects_wrong_column_count() {
        let model = ConstModel {
            id: "asahi".to_string(),
            value: 3.0,
            features: FEATURE_COUNT,
        };
        let err = predict(&model, &matrix(2, FEATURE_COUNT - 1)).unwrap_err();
        assert_eq!(err.model, "asahi");
        assert!(err.cause.contains("10 columns"));
    }

    #[test]
    fn test_predict_rejects_short_output() {
        struct ShortModel;
        impl PredictionModel for ShortModel {
            fn identifier(&self) -> &str {
                "short"
            }
            fn input_feature_count(&self) -> usize {
                FEATURE_COUNT
            }
            fn predict(&self, _matrix: &FeatureMatrix) -> Result<Vec<f32>, InferenceError> {
                Ok(vec![1.0])
            }
        }

        let err = predict(&ShortModel, &matrix(3, FEATURE_COUNT)).unwrap_err();
        assert_eq!(err.model, "short");
    }

    #[test]
    fn test_predict_one_value_per_row() {
        let model = ConstModel {
            id: PRIMARY_MODEL.to_string(),
            value: 42.0,
            features: FEATURE_COUNT,
        };
        assert_eq!(predict(&model, &matrix(3, FEATURE_COUNT)).unwrap(), vec![42.0; 3]);
    }
}

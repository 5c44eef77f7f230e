//! ONNX inference using tract
//!
//! Sales models are exported regressors taking an `[N, features]` f32 input
//! and producing one value per row. The batch dimension is left symbolic so a
//! whole forecast horizon is scored in a single run. Plans are optimized once
//! at load time and shared read-only across requests.

use super::features::{FeatureMatrix, FEATURE_COUNT};
use super::registry::ModelLoader;
use super::PredictionModel;
use crate::error::{InferenceError, ModelLoadError};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;
use tracing::{debug, warn};

/// Per-run latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 10;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-backed prediction model
pub struct OnnxModel {
    identifier: String,
    input_features: usize,
    plan: TractModel,
}

impl OnnxModel {
    /// Load and optimize a model file
    pub fn load(identifier: impl Into<String>, path: &Path) -> Result<Self, ModelLoadError> {
        let bytes = std::fs::read(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(identifier, &bytes).map_err(|e| ModelLoadError::Invalid {
            path: path.to_path_buf(),
            message: format!("{:#}", e),
        })
    }

    /// Build a model from in-memory ONNX bytes.
    ///
    /// The feature width is taken from the model's declared input. Models that
    /// leave it open are assumed to take the standard feature layout.
    pub fn from_bytes(identifier: impl Into<String>, model_bytes: &[u8]) -> TractResult<Self> {
        let model = tract_onnx::onnx().model_for_read(&mut std::io::Cursor::new(model_bytes))?;

        let input_features = model
            .input_fact(0)?
            .shape
            .dims()
            .last()
            .and_then(|dim| dim.concretize())
            .and_then(|dim| dim.as_i64())
            .and_then(|width| usize::try_from(width).ok())
            .unwrap_or(FEATURE_COUNT);

        let batch = model.symbols.sym("N");
        let plan = model
            .with_input_fact(0, f32::fact([TDim::from(batch), TDim::from(input_features)]).into())?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self {
            identifier: identifier.into(),
            input_features,
            plan,
        })
    }

    fn run(&self, matrix: &FeatureMatrix) -> TractResult<Vec<f32>> {
        let result = self.plan.run(tvec!(matrix.to_tensor().into()))?;
        let output = result.first().context("No output from model")?;
        let view = output.to_array_view::<f32>()?;
        Ok(view.iter().copied().collect())
    }
}

impl PredictionModel for OnnxModel {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn input_feature_count(&self) -> usize {
        self.input_features
    }

    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f32>, InferenceError> {
        if matrix.ncols() != self.input_features {
            return Err(InferenceError::new(
                &self.identifier,
                format!("expected {} features, got {}", self.input_features, matrix.ncols()),
            ));
        }
        if matrix.nrows() == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let values = self
            .run(matrix)
            .map_err(|e| InferenceError::new(&self.identifier, format!("{:#}", e)))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                model = %self.identifier,
                rows = matrix.nrows(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        }

        debug!(model = %self.identifier, rows = values.len(), "Inference completed");
        Ok(values)
    }
}

/// Loads `.onnx` files into [`OnnxModel`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxLoader;

impl ModelLoader for OnnxLoader {
    fn load(&self, identifier: &str, path: &Path) -> Result<Arc<dyn PredictionModel>, ModelLoadError> {
        Ok(Arc::new(OnnxModel::load(identifier, path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::registry;
    use std::path::PathBuf;

    // Linear regressors: sales = sum((j + 1) * x[j]) + 0.5
    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("src/predictor/testdata")
            .join(name)
    }

    fn matrix(rows: usize, cols: usize) -> FeatureMatrix {
        FeatureMatrix::from_array(tract_ndarray::Array2::from_shape_fn((rows, cols), |(r, c)| {
            (r * cols + c) as f32 * 0.1
        }))
    }

    fn expected(matrix: &FeatureMatrix) -> Vec<f32> {
        (0..matrix.nrows())
            .map(|i| {
                matrix
                    .row(i)
                    .iter()
                    .enumerate()
                    .map(|(j, x)| (j + 1) as f32 * x)
                    .sum::<f32>()
                    + 0.5
            })
            .collect()
    }

    #[test]
    fn test_linear_model_scores_each_row_in_order() {
        let model = OnnxModel::load("primary", &fixture("linear_11.onnx")).unwrap();
        assert_eq!(model.input_feature_count(), FEATURE_COUNT);

        let m = matrix(3, FEATURE_COUNT);
        let values = registry::predict(&model, &m).unwrap();

        assert_eq!(values.len(), 3);
        for (got, want) in values.iter().zip(expected(&m)) {
            assert!((got - want).abs() < 1e-3, "got {}, want {}", got, want);
        }
        assert!(values[0] < values[1] && values[1] < values[2]);
    }

    #[test]
    fn test_batch_size_is_not_fixed() {
        let model = OnnxModel::load("primary", &fixture("linear_11.onnx")).unwrap();

        for rows in [1, 7, 11] {
            let m = matrix(rows, FEATURE_COUNT);
            assert_eq!(model.predict(&m).unwrap().len(), rows);
        }
    }

    #[test]
    fn test_wrong_width_model_fails_at_inference() {
        let model = OnnxLoader.load("sapporo", &fixture("linear_10.onnx")).unwrap();
        assert_eq!(model.input_feature_count(), 10);

        let err = registry::predict(model.as_ref(), &matrix(3, FEATURE_COUNT)).unwrap_err();
        assert_eq!(err.model, "sapporo");
        assert!(err.cause.contains("model expects 10"));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(OnnxModel::from_bytes("primary", b"not an onnx model").is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = OnnxModel::load("primary", Path::new("/nonexistent/model.onnx")).err();
        assert!(matches!(err, Some(ModelLoadError::Io { .. })));
    }

    #[test]
    fn test_invalid_file_is_invalid_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"garbage").unwrap();

        let err = OnnxLoader.load("broken", &path).err();
        assert!(matches!(err, Some(ModelLoadError::Invalid { .. })));
    }
}

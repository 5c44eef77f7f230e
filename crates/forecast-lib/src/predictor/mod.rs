//! ML prediction engine

mod features;
mod inference;
mod registry;

pub use features::{FeatureEncoder, FeatureMatrix, FEATURE_COUNT, FEATURE_NAMES};
pub use inference::{OnnxLoader, OnnxModel};
pub use registry::{
    load_primary, load_variants, predict, ModelConfig, ModelLoader, ModelRegistry,
    VariantPattern, PRIMARY_MODEL,
};

use crate::error::InferenceError;

/// Trait for scalar regression models over a feature matrix
pub trait PredictionModel: Send + Sync {
    /// Name used in logs, errors and response fields
    fn identifier(&self) -> &str;

    /// Number of columns the model accepts
    fn input_feature_count(&self) -> usize;

    /// Score every row of `matrix`, returning one value per row
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f32>, InferenceError>;
}

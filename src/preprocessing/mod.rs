//! Data preprocessing
//!
//! Standard scaling, one-hot encoding, declarative log transforms and
//! mutual-information feature selection, plus the [`FeaturePipeline`] that
//! binds them to one ordered feature list.

mod encoder;
mod pipeline;
mod scaler;
pub mod feature_selection;
pub mod transforms;

pub use encoder::{ColumnCategories, OneHotEncoder};
pub use feature_selection::{correlation_matrix, pearson_correlation, top_k, FeatureSelector};
pub use pipeline::FeaturePipeline;
pub use scaler::StandardScaler;
pub use transforms::{fit_transforms, ColumnTransform, TransformType};

//! Model training module
//!
//! Provides the three candidate families compared by the trainer stage:
//! - Random Forest (bagged CART trees)
//! - Logistic Regression (L2, gradient descent)
//! - Gradient Boosting (log-loss, Newton leaves)

pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod metrics;
mod models;
pub mod random_forest;
mod trainer;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingParams};
pub use linear_models::{LogisticRegression, LogisticRegressionParams};
pub use metrics::{accuracy, roc_auc, weighted_f1, weighted_precision_recall_f1, ModelMetrics};
pub use models::{ClassifierModel, TrainedModel};
pub use random_forest::{MaxFeatures, RandomForestClassifier, RandomForestParams};
pub use trainer::{check_accuracy_gate, select_best, CandidateResult, ModelTrainer};

//! Data validation stage
//!
//! Checks both splits against the schema, summarises data quality and runs
//! a KS drift test per shared numeric column. Reports are always written;
//! whether a failed schema check stops the pipeline is decided by
//! `data_validation.enforce`.

pub mod drift;
pub mod quality;
pub mod report;
pub mod schema;

pub use drift::{ColumnDrift, KolmogorovSmirnovTest};
pub use quality::{DataQualityDocument, NumericStats, QualityReport};
pub use schema::{validate_test, validate_train, SplitValidation};

use crate::artifacts::DataValidationArtifact;
use crate::config::DataValidationConfig;
use crate::error::{PipelineError, Result};
use crate::utils::{self, column_f64, column_names, is_numeric_dtype};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Contents of status.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub validation_status: bool,
    pub train_validation: SplitValidation,
    pub test_validation: SplitValidation,
}

impl ValidationStatus {
    pub fn evaluate(train: &DataFrame, test: &DataFrame, schema: &crate::config::Schema) -> Self {
        let train_validation = validate_train(train, schema);
        let test_validation = validate_test(test, schema);
        Self {
            validation_status: train_validation.status && test_validation.status,
            train_validation,
            test_validation,
        }
    }
}

/// KS test over every column numeric in both splits, target excluded
pub fn detect_drift(
    train: &DataFrame,
    test: &DataFrame,
    target: &str,
    ks: &KolmogorovSmirnovTest,
) -> Result<BTreeMap<String, ColumnDrift>> {
    let mut results = BTreeMap::new();
    for name in column_names(train) {
        if name == target {
            continue;
        }
        let (Ok(train_col), Ok(test_col)) = (train.column(&name), test.column(&name)) else {
            continue;
        };
        if !(is_numeric_dtype(train_col.dtype()) && is_numeric_dtype(test_col.dtype())) {
            continue;
        }

        match ks.test(&column_f64(train, &name)?, &column_f64(test, &name)?) {
            Ok(result) => {
                if result.drift_detected {
                    warn!(column = %name, ks = result.ks_statistic, p_value = result.p_value, "Drift detected");
                }
                results.insert(name, result);
            }
            Err(e) => warn!(column = %name, error = %e, "Skipping drift test"),
        }
    }
    Ok(results)
}

pub struct DataValidation {
    config: DataValidationConfig,
}

impl DataValidation {
    pub fn new(config: DataValidationConfig) -> Self {
        Self { config }
    }

    /// Validate, write status/quality/drift reports, and enforce if configured
    pub fn validate_all_columns(&self) -> Result<DataValidationArtifact> {
        let train = utils::load_csv(&self.config.train_file_path)?;
        let test = utils::load_csv(&self.config.test_file_path)?;
        info!(
            train_shape = ?train.shape(),
            test_shape = ?test.shape(),
            "Validating datasets"
        );

        let status = ValidationStatus::evaluate(&train, &test, &self.config.schema);

        let quality = DataQualityDocument {
            train: QualityReport::compute(&train)?,
            test: QualityReport::compute(&test)?,
        };

        let ks = KolmogorovSmirnovTest::new(self.config.drift_p_value_threshold);
        let drift = detect_drift(&train, &test, self.config.schema.target(), &ks)?;
        let drifted_columns: Vec<String> = drift
            .iter()
            .filter(|(_, r)| r.drift_detected)
            .map(|(name, _)| name.clone())
            .collect();

        utils::save_json(&self.config.validation_status_file, &status)?;
        utils::save_json(&self.config.data_quality_report_file, &quality)?;
        utils::save_text(&self.config.drift_report_file, &report::render_drift_report(&drift, &status))?;

        info!(
            status = status.validation_status,
            train_missing = quality.train.total_missing(),
            test_missing = quality.test.total_missing(),
            drifted = drifted_columns.len(),
            tested = drift.len(),
            "Data validation finished"
        );

        if !status.validation_status {
            let detail = format!(
                "train missing {:?}, train dtype errors {:?}, test missing {:?}, test dtype errors {:?}",
                status.train_validation.missing_columns,
                status.train_validation.dtype_errors,
                status.test_validation.missing_columns,
                status.test_validation.dtype_errors,
            );
            if self.config.enforce {
                return Err(PipelineError::Validation(detail));
            }
            warn!(detail = %detail, "Schema validation failed; continuing because enforcement is off");
        }

        Ok(DataValidationArtifact {
            validation_status: status.validation_status,
            validation_status_file_path: self.config.validation_status_file.clone(),
            drift_report_file_path: self.config.drift_report_file.clone(),
            data_quality_report_file_path: self.config.data_quality_report_file.clone(),
            train_file_path: self.config.train_file_path.clone(),
            test_file_path: self.config.test_file_path.clone(),
            drifted_columns,
        })
    }
}

//! Request validation and feature reconstruction
//!
//! A prediction request is validated into a [`CustomerRecord`] and turned
//! into a single model input row by a [`PreprocessingStrategy`], chosen once
//! when the service starts.

use super::error::{Result, ServerError};
use crate::preprocessing::{FeaturePipeline, StandardScaler};
use crate::utils;
use ndarray::Array2;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

pub const REQUIRED_FIELDS: [&str; 8] = ["age", "job", "marital", "education", "housing", "loan", "duration", "campaign"];

/// One validated customer, with defaults applied to optional fields
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub age: i64,
    pub job: String,
    pub marital: String,
    pub education: String,
    pub default: String,
    pub balance: i64,
    pub housing: String,
    pub loan: String,
    pub contact: String,
    pub day: i64,
    pub month: String,
    pub duration: i64,
    pub campaign: i64,
    pub pdays: i64,
    pub previous: i64,
    pub poutcome: String,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Integer coercion: whole JSON numbers, floats truncated, numeric strings
fn coerce_int(field: &str, value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    parsed.ok_or_else(|| ServerError::BadRequest(format!("field '{}' must be an integer, got {}", field, value)))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

impl CustomerRecord {
    pub fn from_json(body: &Value) -> Result<Self> {
        let map = body
            .as_object()
            .ok_or_else(|| ServerError::BadRequest("request body must be a JSON object".to_string()))?;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| map.get(**f).map_or(true, is_blank))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ServerError::MissingFields(missing));
        }

        let int = |field: &str, default: i64| -> Result<i64> {
            match map.get(field) {
                Some(v) if !is_blank(v) => coerce_int(field, v),
                _ => Ok(default),
            }
        };
        let string = |field: &str, default: &str| -> String {
            match map.get(field) {
                Some(v) if !is_blank(v) => text(v),
                _ => default.to_string(),
            }
        };

        Ok(Self {
            age: int("age", 0)?,
            job: string("job", ""),
            marital: string("marital", ""),
            education: string("education", ""),
            default: string("default", "no"),
            balance: int("balance", 1500)?,
            housing: string("housing", ""),
            loan: string("loan", ""),
            contact: string("contact", "cellular"),
            day: int("day", 15)?,
            month: string("month", "may"),
            duration: int("duration", 0)?,
            campaign: int("campaign", 0)?,
            pdays: int("pdays", -1)?,
            previous: int("previous", 0)?,
            poutcome: string("poutcome", "unknown"),
        })
    }

    /// Single-row frame with the raw bank columns
    pub fn to_frame(&self) -> Result<DataFrame> {
        let df = df!(
            "age" => [self.age],
            "job" => [self.job.as_str()],
            "marital" => [self.marital.as_str()],
            "education" => [self.education.as_str()],
            "default" => [self.default.as_str()],
            "balance" => [self.balance],
            "housing" => [self.housing.as_str()],
            "loan" => [self.loan.as_str()],
            "contact" => [self.contact.as_str()],
            "day" => [self.day],
            "month" => [self.month.as_str()],
            "duration" => [self.duration],
            "campaign" => [self.campaign],
            "pdays" => [self.pdays],
            "previous" => [self.previous],
            "poutcome" => [self.poutcome.as_str()]
        )
        .map_err(|e| ServerError::Internal(e.to_string()))?;
        Ok(df)
    }

    /// Rough standardisation around typical customer values
    fn numeric_estimates(&self) -> [(&'static str, f64); 7] {
        [
            ("age", (self.age as f64 - 40.0) / 10.0),
            ("balance", (self.balance as f64 - 1000.0) / 2000.0),
            ("duration", (self.duration as f64 - 250.0) / 200.0),
            ("campaign", (self.campaign as f64 - 2.0) / 2.0),
            ("day", (self.day as f64 - 15.0) / 10.0),
            ("pdays", (self.pdays as f64 + 1.0) / 400.0),
            ("previous", self.previous as f64 / 5.0),
        ]
    }

    fn indicator_columns(&self) -> [String; 5] {
        [
            format!("housing_{}", self.housing),
            format!("contact_{}", self.contact),
            format!("education_{}", self.education),
            format!("month_{}", self.month),
            format!("poutcome_{}", self.poutcome),
        ]
    }
}

/// How raw requests become model inputs
#[derive(Debug, Clone)]
pub enum PreprocessingStrategy {
    /// Replays the fitted feature pipeline and the transformation scaler
    FittedTransform {
        pipeline: Box<FeaturePipeline>,
        scaler: StandardScaler,
    },
    /// Approximate vector over the columns of the transformed training data
    HeuristicFallback { columns: Vec<String> },
}

/// Header of `path` minus `target`
fn csv_columns(path: &Path, target: &str) -> crate::error::Result<Vec<String>> {
    let file = File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_n_rows(Some(1))
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(utils::column_names(&df).into_iter().filter(|c| c != target).collect())
}

impl PreprocessingStrategy {
    /// Prefer the fitted artifacts when both exist and agree with the model's
    /// feature order; otherwise fall back to the heuristic
    pub fn resolve(
        preprocessor_path: &Path,
        scaler_path: &Path,
        transformed_train_path: &Path,
        target: &str,
        model_features: Option<&[String]>,
    ) -> Self {
        match Self::fitted(preprocessor_path, scaler_path, model_features) {
            Ok(strategy) => {
                info!(preprocessor = %preprocessor_path.display(), "Using fitted preprocessing");
                return strategy;
            }
            Err(e) => warn!(error = %e, "Fitted preprocessing unavailable; using heuristic reconstruction"),
        }

        let discovered = match csv_columns(transformed_train_path, target) {
            Ok(columns) => columns,
            Err(e) => {
                warn!(path = %transformed_train_path.display(), error = %e, "Could not read feature columns");
                Vec::new()
            }
        };
        let columns = match model_features {
            Some(features) if features.len() != discovered.len() || discovered.is_empty() => {
                warn!(
                    discovered = discovered.len(),
                    model = features.len(),
                    "Transformed data columns disagree with the model; using the model's feature names"
                );
                features.to_vec()
            }
            _ => discovered,
        };
        info!(columns = columns.len(), "Using heuristic preprocessing");
        PreprocessingStrategy::HeuristicFallback { columns }
    }

    fn fitted(
        preprocessor_path: &Path,
        scaler_path: &Path,
        model_features: Option<&[String]>,
    ) -> crate::error::Result<Self> {
        let pipeline = FeaturePipeline::load(preprocessor_path)?;
        let scaler: StandardScaler = utils::load_bin(scaler_path)?;

        let selected = pipeline.selected_feature_names();
        if selected != scaler.columns() {
            return Err(crate::error::PipelineError::Schema(
                "feature pipeline output does not match the scaler columns".to_string(),
            ));
        }
        if let Some(features) = model_features {
            if features != scaler.columns() {
                return Err(crate::error::PipelineError::Schema(
                    "scaler columns do not match the model's feature names".to_string(),
                ));
            }
        }
        Ok(PreprocessingStrategy::FittedTransform {
            pipeline: Box::new(pipeline),
            scaler,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PreprocessingStrategy::FittedTransform { .. } => "fitted_transform",
            PreprocessingStrategy::HeuristicFallback { .. } => "heuristic_fallback",
        }
    }

    pub fn feature_names(&self) -> &[String] {
        match self {
            PreprocessingStrategy::FittedTransform { scaler, .. } => scaler.columns(),
            PreprocessingStrategy::HeuristicFallback { columns } => columns,
        }
    }

    /// One model input row for `record`
    pub fn transform(&self, record: &CustomerRecord) -> Result<Array2<f64>> {
        match self {
            PreprocessingStrategy::FittedTransform { pipeline, scaler } => {
                let encoded = pipeline.transform(&record.to_frame()?).map_err(|e| match e {
                    crate::error::PipelineError::Data(msg) => ServerError::BadRequest(msg),
                    other => ServerError::Pipeline(other),
                })?;
                Ok(scaler.transform_matrix(&encoded)?)
            }
            PreprocessingStrategy::HeuristicFallback { columns } => {
                let mut row = vec![0.0; columns.len()];
                let mut set = |name: &str, value: f64| {
                    if let Some(idx) = columns.iter().position(|c| c == name) {
                        row[idx] = value;
                    }
                };
                for (name, value) in record.numeric_estimates() {
                    set(name, value);
                }
                for name in record.indicator_columns() {
                    set(&name, 1.0);
                }
                Ok(Array2::from_shape_vec((1, columns.len()), row).map_err(crate::error::PipelineError::from)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> Value {
        json!({
            "age": 35, "job": "technician", "marital": "married", "education": "secondary",
            "housing": "yes", "loan": "no", "duration": "450", "campaign": 2.0
        })
    }

    #[test]
    fn test_required_fields_and_defaults() {
        let record = CustomerRecord::from_json(&request()).unwrap();
        assert_eq!(record.duration, 450);
        assert_eq!(record.campaign, 2);
        assert_eq!(record.balance, 1500);
        assert_eq!(record.pdays, -1);
        assert_eq!(record.month, "may");
        assert_eq!(record.poutcome, "unknown");
        assert_eq!(record.default, "no");
    }

    #[test]
    fn test_missing_and_empty_fields_are_named() {
        let mut body = request();
        let map: &mut Map<String, Value> = body.as_object_mut().unwrap();
        map.remove("age");
        map.insert("job".to_string(), json!("  "));

        match CustomerRecord::from_json(&body) {
            Err(ServerError::MissingFields(fields)) => assert_eq!(fields, vec!["age", "job"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_integer_coercion_failure() {
        let mut body = request();
        body["age"] = json!("thirty");
        assert!(matches!(CustomerRecord::from_json(&body), Err(ServerError::BadRequest(_))));
    }

    #[test]
    fn test_heuristic_vector() {
        let columns: Vec<String> = ["age", "duration", "housing_yes", "housing_no", "month_may", "job_admin."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let strategy = PreprocessingStrategy::HeuristicFallback { columns };
        let record = CustomerRecord::from_json(&request()).unwrap();

        let x = strategy.transform(&record).unwrap();
        assert_eq!(x.shape(), &[1, 6]);
        assert!((x[[0, 0]] + 0.5).abs() < 1e-12);
        assert!((x[[0, 1]] - 1.0).abs() < 1e-12);
        assert_eq!(x[[0, 2]], 1.0);
        assert_eq!(x[[0, 3]], 0.0);
        assert_eq!(x[[0, 4]], 1.0);
        assert_eq!(x[[0, 5]], 0.0);

        // Repeated requests give the same vector
        assert_eq!(strategy.transform(&record).unwrap(), x);
    }

    #[test]
    fn test_unknown_category_is_ignored_by_heuristic() {
        let strategy = PreprocessingStrategy::HeuristicFallback {
            columns: vec!["housing_yes".into(), "housing_no".into()],
        };
        let mut body = request();
        body["housing"] = json!("maybe");
        let record = CustomerRecord::from_json(&body).unwrap();
        assert_eq!(strategy.transform(&record).unwrap().sum(), 0.0);
    }

    #[test]
    fn test_missing_artifacts_fall_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut train = df!("age" => [0.1], "housing_yes" => [1.0], "y" => [1i64]).unwrap();
        let csv = tmp.path().join("train.csv");
        utils::save_csv(&mut train, &csv).unwrap();

        let strategy = PreprocessingStrategy::resolve(
            &tmp.path().join("missing.bin"),
            &tmp.path().join("missing_scaler.bin"),
            &csv,
            "y",
            None,
        );
        assert_eq!(strategy.name(), "heuristic_fallback");
        assert_eq!(strategy.feature_names(), &["age".to_string(), "housing_yes".to_string()]);
    }
}

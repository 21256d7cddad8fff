//! Column presence and dtype checks against schema.yaml

use crate::config::Schema;
use crate::utils::dtype_name;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Result of checking one split against the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitValidation {
    pub status: bool,
    pub missing_columns: Vec<String>,
    /// `column: expected X, got Y` entries
    pub dtype_errors: Vec<String>,
}

/// Check that every schema column exists (minus `exclude`) and has the declared dtype
pub fn validate_columns(df: &DataFrame, schema: &Schema, exclude: Option<&str>) -> (Vec<String>, Vec<String>) {
    let mut missing = Vec::new();
    let mut dtype_errors = Vec::new();

    for (column, expected) in &schema.columns {
        if Some(column.as_str()) == exclude {
            continue;
        }
        match df.column(column) {
            Ok(col) => {
                let actual = dtype_name(col.dtype());
                if actual != expected.as_str() {
                    dtype_errors.push(format!("{}: expected {}, got {}", column, expected, actual));
                }
            }
            Err(_) => missing.push(column.clone()),
        }
    }

    (missing, dtype_errors)
}

/// Train split: all schema columns, dtypes enforced
pub fn validate_train(df: &DataFrame, schema: &Schema) -> SplitValidation {
    let (missing_columns, dtype_errors) = validate_columns(df, schema, None);
    SplitValidation {
        status: missing_columns.is_empty() && dtype_errors.is_empty(),
        missing_columns,
        dtype_errors,
    }
}

/// Test split: target excluded, dtypes enforced on present columns
pub fn validate_test(df: &DataFrame, schema: &Schema) -> SplitValidation {
    let (missing_columns, dtype_errors) = validate_columns(df, schema, Some(schema.target()));
    SplitValidation {
        status: missing_columns.is_empty() && dtype_errors.is_empty(),
        missing_columns,
        dtype_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Schema, TargetColumn};
    use polars::prelude::*;
    use std::collections::BTreeMap;

    fn schema() -> Schema {
        let mut columns = BTreeMap::new();
        columns.insert("age".to_string(), "int64".to_string());
        columns.insert("job".to_string(), "object".to_string());
        columns.insert("y".to_string(), "int64".to_string());
        Schema {
            columns,
            target_column: TargetColumn { name: "y".to_string() },
        }
    }

    #[test]
    fn test_valid_train() {
        let df = df!("age" => &[30i64], "job" => &["admin."], "y" => &[1i64]).unwrap();
        let result = validate_train(&df, &schema());
        assert!(result.status);
        assert!(result.missing_columns.is_empty());
    }

    #[test]
    fn test_missing_and_mistyped() {
        let df = df!("age" => &[30.5f64], "y" => &[1i64]).unwrap();
        let result = validate_train(&df, &schema());
        assert!(!result.status);
        assert_eq!(result.missing_columns, vec!["job".to_string()]);
        assert_eq!(result.dtype_errors, vec!["age: expected int64, got float64".to_string()]);
    }

    #[test]
    fn test_target_not_required_in_test_split() {
        let df = df!("age" => &[30i64], "job" => &["admin."]).unwrap();
        let result = validate_test(&df, &schema());
        assert!(result.status);
        assert!(result.dtype_errors.is_empty());
    }

    #[test]
    fn test_test_split_dtype_mismatch_fails() {
        let df = df!("age" => &["thirty"], "job" => &["admin."]).unwrap();
        let result = validate_test(&df, &schema());
        assert!(!result.status);
        assert_eq!(result.dtype_errors.len(), 1);
    }
}

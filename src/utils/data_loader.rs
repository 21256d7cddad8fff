//! CSV loading/saving and column extraction helpers

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Rows used for dtype inference; bank columns are homogeneous so a large
/// window keeps `balance`/`pdays` from being inferred from a lucky prefix
const INFER_SCHEMA_ROWS: usize = 10_000;

/// Load a CSV file with a header row
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::Data(format!("file not found: {}", path.display())));
    }
    let file = File::open(path)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .into_reader_with_file_handle(file)
        .finish()?;

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
    Ok(df)
}

/// Load a CSV file and fail if it has no rows
pub fn load_non_empty_csv(path: &Path) -> Result<DataFrame> {
    let df = load_csv(path)?;
    if df.height() == 0 || df.width() == 0 {
        return Err(PipelineError::Data(format!("file is empty: {}", path.display())));
    }
    Ok(df)
}

/// Write a CSV file with a header row, creating parent directories
pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    debug!(path = %path.display(), rows = df.height(), "Saved CSV");
    Ok(())
}

/// Column names in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Pandas-style dtype name used by schema.yaml
pub fn dtype_name(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "int64",
        DataType::Float32 | DataType::Float64 => "float64",
        DataType::Boolean => "bool",
        DataType::Date | DataType::Datetime(_, _) => "datetime64",
        _ => "object",
    }
}

pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(dtype_name(dtype), "int64" | "float64")
}

/// Numeric column as f64; nulls become NaN
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Data(format!("column '{}' not found", name)))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Column rendered as strings; nulls become "missing"
pub fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Data(format!("column '{}' not found", name)))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    let ca = series.str()?;
    Ok(ca
        .into_iter()
        .map(|v| v.map(str::to_string).unwrap_or_else(|| "missing".to_string()))
        .collect())
}

/// Binary target as 0.0/1.0; accepts numeric labels or yes/no strings
pub fn target_labels(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Data(format!("target column '{}' not found", name)))?;

    if is_numeric_dtype(column.dtype()) {
        let values = column_f64(df, name)?;
        if values.iter().any(|v| v.is_nan()) {
            return Err(PipelineError::Data(format!("target column '{}' has nulls", name)));
        }
        return Ok(values.into_iter().map(|v| if v >= 0.5 { 1.0 } else { 0.0 }).collect());
    }

    column_strings(df, name)?
        .into_iter()
        .map(|v| match v.trim().to_lowercase().as_str() {
            "yes" | "1" | "true" => Ok(1.0),
            "no" | "0" | "false" => Ok(0.0),
            other => Err(PipelineError::Data(format!(
                "unrecognised target value '{}' in column '{}'",
                other, name
            ))),
        })
        .collect()
}

/// Dense matrix of the named columns, in the given order
pub fn to_feature_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut data = Vec::with_capacity(n_rows * columns.len());
    let cols: Vec<Vec<f64>> = columns
        .iter()
        .map(|c| column_f64(df, c))
        .collect::<Result<_>>()?;

    for i in 0..n_rows {
        for col in &cols {
            data.push(col[i]);
        }
    }

    Ok(Array2::from_shape_vec((n_rows, columns.len()), data)?)
}

/// Frame with one f64 column per matrix column
pub fn frame_from_matrix(names: &[String], x: &Array2<f64>) -> Result<DataFrame> {
    if names.len() != x.ncols() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} columns", names.len()),
            actual: format!("{} columns", x.ncols()),
        });
    }
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(j, name)| Series::new(name.as_str().into(), x.column(j).to_vec()).into())
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Append (or replace) an f64 column
pub fn with_f64_column(df: &mut DataFrame, name: &str, values: Vec<f64>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Select rows by position
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), indices.iter().map(|&i| i as IdxSize).collect());
    Ok(df.take(&idx)?)
}

/// Number of rows identical to an earlier row
pub fn duplicate_row_count(df: &DataFrame) -> Result<usize> {
    let names = column_names(df);
    let rendered: Vec<Vec<String>> = names
        .iter()
        .map(|n| column_strings(df, n))
        .collect::<Result<_>>()?;

    let mut seen = HashSet::with_capacity(df.height());
    let mut duplicates = 0;
    for i in 0..df.height() {
        let key: Vec<&str> = rendered.iter().map(|col| col[i].as_str()).collect();
        if !seen.insert(key.join("\u{1f}")) {
            duplicates += 1;
        }
    }
    Ok(duplicates)
}

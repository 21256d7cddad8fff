//! Utility functions: CSV IO, artifact persistence, sampling

pub mod data_loader;
pub mod io;
pub mod sampling;

pub use data_loader::{
    column_f64, column_names, column_strings, dtype_name, frame_from_matrix, is_numeric_dtype,
    load_csv, load_non_empty_csv, save_csv, take_rows, target_labels, to_feature_matrix, with_f64_column,
};
pub use io::{load_bin, load_json, save_bin, save_json, save_text};
pub use sampling::{fixed_size_split, stratified_sample, uniform_sample, SplitIndices};

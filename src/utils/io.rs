//! JSON and binary artifact persistence

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write `value` as pretty-printed JSON
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    debug!(path = %path.display(), "JSON saved");
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write `value` with bincode
pub fn save_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let bytes = bincode::serialize(value)?;
    std::fs::write(path, bytes)?;
    debug!(path = %path.display(), "Binary artifact saved");
    Ok(())
}

pub fn load_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(PipelineError::ModelNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Write a text artifact (HTML, SVG)
pub fn save_text(path: &Path, content: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, content)?;
    debug!(path = %path.display(), bytes = content.len(), "Text artifact saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        name: String,
        weights: Vec<f64>,
    }

    #[test]
    fn test_bin_missing_file_is_model_not_found() {
        let result: Result<Probe> = load_bin(Path::new("/nonexistent/model.bin"));
        assert!(matches!(result, Err(PipelineError::ModelNotFound(_))));
    }

    #[test]
    fn test_bin_preserves_floats_exactly() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a").join("probe.bin");
        let probe = Probe { name: "p".into(), weights: vec![0.1, 1.0 / 3.0, -2.5e-9] };
        save_bin(&path, &probe).unwrap();
        assert_eq!(load_bin::<Probe>(&path).unwrap(), probe);
    }
}

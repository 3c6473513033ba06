// ============================================================
// Layer 4 — JSON Example Loader
// ============================================================
// Reads examples from a JSON file. Two layouts are accepted:
//
//   1. A bare array of vectors:
//        [[0, 1, 1, 0], [1, 1, 0, 0], ...]
//
//   2. An object with labelled examples:
//        { "examples": [ { "features": [0, 1], "label": 3 }, ... ] }
//
// This is how externally prepared datasets (and the inputs of a
// reconstruction run) reach the model; converting image datasets
// into this layout happens outside the crate.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::{Path, PathBuf}};

use crate::domain::error::NecstError;
use crate::domain::example::Example;
use crate::domain::traits::ExampleSource;

#[derive(Deserialize)]
#[serde(untagged)]
enum ExampleFile {
    Bare(Vec<Vec<f32>>),
    Labelled { examples: Vec<Example> },
}

/// Loads examples from one JSON file.
/// Implements the ExampleSource trait from Layer 3.
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Self { path, name }
    }
}

impl ExampleSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_all(&self) -> Result<Vec<Example>> {
        let examples = load_examples(&self.path)?;
        tracing::info!("Loaded {} examples from '{}'", examples.len(), self.path.display());
        Ok(examples)
    }
}

/// Parse a JSON example file and check that all vectors share one dimension.
pub fn load_examples(path: &Path) -> Result<Vec<Example>> {
    let json = fs::read_to_string(path)
        .map_err(|e| NecstError::io(path, e))
        .with_context(|| format!("Cannot read example file '{}'", path.display()))?;

    let parsed: ExampleFile = serde_json::from_str(&json)
        .with_context(|| format!("'{}' is not a valid example file", path.display()))?;

    let examples = match parsed {
        ExampleFile::Bare(rows) => rows.into_iter().map(Example::new).collect::<Vec<_>>(),
        ExampleFile::Labelled { examples } => examples,
    };

    if let Some(first) = examples.first() {
        let dim = first.dim();
        if dim == 0 {
            return Err(NecstError::config(format!("'{}' contains empty vectors", path.display())).into());
        }
        if let Some((i, bad)) = examples.iter().enumerate().find(|(_, e)| e.dim() != dim) {
            return Err(NecstError::config(format!(
                "example {i} in '{}' has {} features, expected {dim}",
                path.display(),
                bad.dim(),
            ))
            .into());
        }
    }
    Ok(examples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("data.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_bare_array_layout() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, "[[0, 1, 1], [1, 0, 0]]");
        let src  = JsonFileSource::new(&path);
        let ex   = src.load_all().unwrap();
        assert_eq!(ex.len(), 2);
        assert_eq!(ex[0].features, vec![0.0, 1.0, 1.0]);
        assert_eq!(src.name(), "data");
    }

    #[test]
    fn test_labelled_layout() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, r#"{"examples":[{"features":[0.5,0.25],"label":4}]}"#);
        let ex   = load_examples(&path).unwrap();
        assert_eq!(ex[0].label, Some(4));
    }

    #[test]
    fn test_ragged_vectors_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, "[[0, 1], [1]]");
        let err  = load_examples(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<NecstError>(), Some(NecstError::Configuration(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_examples(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err.downcast_ref::<NecstError>(), Some(NecstError::Io { .. })));
    }
}

// ============================================================
// Layer 2 — Data Preparation
// ============================================================
// Shared by training and analysis so both see the same splits:
//
//   Step 1: Pick the example source       (Layer 4 - data)
//   Step 2: Load every example            (Layer 4 - data)
//   Step 3: Clean / binarise features     (Layer 4 - data)
//   Step 4: Seeded train / valid / test   (Layer 4 - data)

use anyhow::Result;

use crate::data::{
    loader::JsonFileSource,
    preprocessor::Preprocessor,
    splitter::{split_three, SplitFractions, Splits},
    synthetic::SyntheticSource,
};
use crate::domain::{
    config::{DatasourceKind, NecstConfig},
    error::NecstError,
    example::{Example, InputDomain},
    traits::ExampleSource,
};

pub struct PreparedData {
    /// Datasource name, the first component of the run layout
    pub source_name: String,
    pub splits:      Splits<Example>,
}

pub fn build_source(cfg: &NecstConfig) -> Result<Box<dyn ExampleSource>> {
    Ok(match cfg.datasource {
        DatasourceKind::Random => Box::new(SyntheticSource::new(cfg.synthetic_size, cfg.input_dim, cfg.seed)),
        DatasourceKind::File => {
            let path = cfg
                .data_file
                .as_ref()
                .ok_or_else(|| NecstError::config("datasource 'file' requires --data-file"))?;
            Box::new(JsonFileSource::new(path))
        }
    })
}

/// Load, clean and split the configured examples
pub fn prepare_data(cfg: &NecstConfig) -> Result<PreparedData> {
    let source = build_source(cfg)?;
    let mut examples = source.load_all()?;
    tracing::info!("Loaded {} examples from '{}'", examples.len(), source.name());

    let report = Preprocessor::new(cfg.is_binary).prepare(&mut examples);
    if report.binarized > 0 {
        tracing::info!("Binarised {} feature values at 0.5", report.binarized);
    }

    let observed = InputDomain::from_flag(examples.iter().all(Example::is_binary));
    if observed == InputDomain::Binary && !cfg.is_binary {
        tracing::info!("Inputs are binary but --is-binary is off: using the Gaussian likelihood");
    }

    let splits = split_three(examples, SplitFractions::default(), cfg.seed);
    tracing::info!(
        "Split: {} train, {} validation, {} test",
        splits.train.len(), splits.valid.len(), splits.test.len(),
    );
    if splits.train.is_empty() {
        return Err(NecstError::config(format!("datasource '{}' produced no training examples", source.name())).into());
    }

    Ok(PreparedData { source_name: source.name().to_string(), splits })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_random_source_is_reproducible() {
        let cfg = NecstConfig { synthetic_size: 50, input_dim: 8, ..NecstConfig::default() };
        let a = prepare_data(&cfg).unwrap();
        let b = prepare_data(&cfg).unwrap();
        assert_eq!(a.source_name, "random");
        assert_eq!(a.splits.test, b.splits.test);
        assert_eq!(a.splits.train.len() + a.splits.valid.len() + a.splits.test.len(), 50);
    }

    #[test]
    fn test_file_source_is_binarised_when_requested() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("digits.json");
        let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![0.2, 0.8, i as f32 / 10.0]).collect();
        fs::write(&path, serde_json::to_string(&rows).unwrap()).unwrap();

        let cfg = NecstConfig {
            datasource: DatasourceKind::File,
            data_file:  Some(path),
            is_binary:  true,
            ..NecstConfig::default()
        };
        let data = prepare_data(&cfg).unwrap();
        assert_eq!(data.source_name, "digits");
        assert!(data.splits.train.iter().all(Example::is_binary));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let cfg = NecstConfig {
            datasource: DatasourceKind::File,
            data_file:  Some("/nonexistent/necst/data.json".into()),
            ..NecstConfig::default()
        };
        let err = prepare_data(&cfg).err().unwrap();
        assert!(matches!(err.downcast_ref::<NecstError>(), Some(NecstError::Io { .. })));
    }
}

// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one row per log interval, in two formats:
//
//   metrics.csv     — open in a spreadsheet, plot learning curves
//   metrics.jsonl   — one JSON object per line, for scripts
//
// Both files are append-only. A resumed run keeps writing to the
// same files, so the curves of an interrupted run stay continuous.
//
// Example CSV output:
//   epoch,step,train_loss,valid_loss,best
//   0,500,41.203100,39.877400,1
//   0,1000,35.118200,34.902100,1
//   1,1500,33.870500,35.010300,0
//
// How to read the metrics:
//   - Losses are negative log-likelihoods plus the weight penalty
//   - valid_loss rising while train_loss falls → overfitting
//   - `best` marks the rows whose checkpoint became best.json
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::error::NecstError;

const CSV_HEADER: &str = "epoch,step,train_loss,valid_loss,best";

/// Losses at one log interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalMetrics {
    pub epoch:      usize,
    pub step:       usize,

    /// Mean training loss since the previous log interval
    pub train_loss: f64,

    /// Loss over the whole validation split at this step
    pub valid_loss: f64,

    /// True when this interval produced a new best checkpoint
    pub is_best:    bool,
}

pub struct MetricsLogger {
    csv_path:   PathBuf,
    jsonl_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| NecstError::io(dir, e))?;

        let csv_path   = dir.join("metrics.csv");
        let jsonl_path = dir.join("metrics.jsonl");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path).map_err(|e| NecstError::io(&csv_path, e))?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path, jsonl_path })
    }

    pub fn log(&self, m: &IntervalMetrics) -> Result<()> {
        let mut csv = append(&self.csv_path)?;
        writeln!(
            csv,
            "{},{},{:.6},{:.6},{}",
            m.epoch, m.step, m.train_loss, m.valid_loss, u8::from(m.is_best),
        )?;

        let mut jsonl = append(&self.jsonl_path)?;
        writeln!(jsonl, "{}", serde_json::to_string(m)?)?;

        tracing::debug!(
            "Logged step {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.step, m.train_loss, m.valid_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path { &self.csv_path }

    pub fn jsonl_path(&self) -> &Path { &self.jsonl_path }
}

fn append(path: &Path) -> Result<fs::File> {
    Ok(OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NecstError::io(path, e))?)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: usize, valid_loss: f64) -> IntervalMetrics {
        IntervalMetrics { epoch: 0, step, train_loss: 2.0, valid_loss, is_best: true }
    }

    #[test]
    fn test_rows_append_across_loggers() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&row(10, 1.5)).unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&row(20, 1.25)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("0,20,2.000000,1.250000,1"));

        let jsonl = fs::read_to_string(logger.jsonl_path()).unwrap();
        let last: IntervalMetrics = serde_json::from_str(jsonl.lines().last().unwrap()).unwrap();
        assert_eq!(last, row(20, 1.25));
    }
}

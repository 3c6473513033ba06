// ============================================================
// Layer 6 — Run Log (log.txt)
// ============================================================
// Human-readable, append-only record of a run. Every line also
// goes to tracing, so the console and the file agree.
//
// One line has a fixed shape that other tools rely on:
//
//   Restoring ckpt at epoch <E> with lowest validation loss <L>: <CKPT>
//
// Everything after the first ": " is a checkpoint reference that
// `--ckpt` accepts, spaces included. When no best.json is
// available, analysis recovers the best checkpoint by scanning
// for the newest such line.

use anyhow::Result;
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::error::NecstError;

pub const RESTORE_MARKER: &str = "Restoring ckpt at epoch";

pub fn restore_line(epoch: usize, valid_loss: f64, ckpt: &str) -> String {
    format!("{RESTORE_MARKER} {epoch} with lowest validation loss {valid_loss:.6}: {ckpt}")
}

/// Optional file sink; with no file the log only reaches tracing
pub struct RunLog {
    file: Option<BufWriter<File>>,
}

impl RunLog {
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        let file = match &path {
            Some(p) => {
                if let Some(parent) = p.parent() {
                    fs::create_dir_all(parent).map_err(|e| NecstError::io(parent, e))?;
                }
                let f = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(p)
                    .map_err(|e| NecstError::io(p, e))?;
                Some(BufWriter::new(f))
            }
            None => None,
        };
        Ok(Self { file })
    }

    /// Console only
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn line(&mut self, msg: impl AsRef<str>) -> Result<()> {
        let msg = msg.as_ref();
        tracing::info!("{msg}");
        self.write(msg)
    }

    pub fn warn(&mut self, msg: impl AsRef<str>) -> Result<()> {
        let msg = msg.as_ref();
        tracing::warn!("{msg}");
        self.write(&format!("WARNING: {msg}"))
    }

    fn write(&mut self, msg: &str) -> Result<()> {
        if let Some(f) = self.file.as_mut() {
            writeln!(f, "{msg}")?;
            f.flush()?;
        }
        Ok(())
    }
}

/// Checkpoint named by the newest restore line in `path`, if any
pub fn scan_best_checkpoint(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|e| NecstError::io(path, e))?;
    Ok(text
        .lines()
        .filter_map(|l| l.find(RESTORE_MARKER).map(|i| &l[i..]))
        .filter_map(|l| l.split_once(": ").map(|(_, ckpt)| ckpt.trim_end()))
        .filter(|ckpt| !ckpt.is_empty())
        .last()
        .map(str::to_string))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_line_ends_with_checkpoint() {
        let line = restore_line(3, 12.5, "models/random/noise_0.1/0/ckpt-00000500.json");
        assert!(line.starts_with(RESTORE_MARKER));
        assert_eq!(line.split_whitespace().last(), Some("models/random/noise_0.1/0/ckpt-00000500.json"));
    }

    #[test]
    fn test_scan_picks_newest_restore_line() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut log = RunLog::open(Some(path.clone())).unwrap();
        log.line("Epoch 0 step 10 | train_loss=3.0").unwrap();
        log.line(restore_line(0, 3.0, "ckpt-00000010")).unwrap();
        log.warn("skipped a step").unwrap();
        log.line(restore_line(1, 2.0, "ckpt-00000020")).unwrap();
        drop(log);

        assert_eq!(scan_best_checkpoint(&path).unwrap().as_deref(), Some("ckpt-00000020"));
    }

    #[test]
    fn test_scan_keeps_paths_with_spaces() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let ckpt = "/tmp/my runs/noise 0.1/ckpt-00000010.json";
        fs::write(&path, format!("{}\n", restore_line(0, 1.0, ckpt))).unwrap();

        assert_eq!(scan_best_checkpoint(&path).unwrap().as_deref(), Some(ckpt));
    }

    #[test]
    fn test_scan_missing_or_unmarked_log() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(scan_best_checkpoint(&dir.path().join("log.txt")).unwrap(), None);

        let path = dir.path().join("other.txt");
        fs::write(&path, "nothing to see\n").unwrap();
        assert_eq!(scan_best_checkpoint(&path).unwrap(), None);
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let mut log = RunLog::disabled();
        log.line("console only").unwrap();
        assert!(log.file.is_none());
    }
}

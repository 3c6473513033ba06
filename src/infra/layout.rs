// ============================================================
// Layer 6 — Run Directory Layout
// ============================================================
// Where a run keeps its files:
//
//   {logdir}/{datasource}/noise_{p}/{exp_id}/
//       ckpt-*, latest.json, best.json, model_config.json
//       metrics.csv, metrics.jsonl
//   {outdir}/{datasource}/noise_{p}/{exp_id}/
//       config.json, log.txt, analysis outputs
//
// Creating the layout twice is harmless, so train and analyze
// can both call `create()`.

use anyhow::Result;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{config::NecstConfig, error::NecstError};
use crate::infra::checkpoint::write_json_atomic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub logdir: PathBuf,
    pub outdir: PathBuf,
}

impl RunLayout {
    pub fn new(cfg: &NecstConfig, datasource: &str) -> Self {
        let run = Path::new(datasource)
            .join(cfg.noise_subpath())
            .join(&cfg.exp_id);
        Self {
            logdir: Path::new(&cfg.logdir).join(&run),
            outdir: Path::new(&cfg.outdir).join(&run),
        }
    }

    pub fn create(&self) -> Result<()> {
        for dir in [&self.logdir, &self.outdir] {
            fs::create_dir_all(dir).map_err(|e| NecstError::io(dir, e))?;
        }
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf { self.outdir.join("log.txt") }

    pub fn output(&self, name: &str) -> PathBuf { self.outdir.join(name) }

    /// Write the effective configuration as outdir/config.json
    pub fn dump_config(&self, cfg: &NecstConfig) -> Result<PathBuf> {
        let path = self.output("config.json");
        write_json_atomic(&path, cfg)?;
        Ok(path)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> NecstConfig {
        NecstConfig {
            logdir: root.join("models").display().to_string(),
            outdir: root.join("results").display().to_string(),
            noise: 0.1,
            exp_id: "bsc-a".into(),
            ..NecstConfig::default()
        }
    }

    #[test]
    fn test_paths_follow_datasource_noise_and_experiment() {
        let dir    = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(&config(dir.path()), "random");
        assert!(layout.logdir.ends_with("models/random/noise_0.1/bsc-a"));
        assert!(layout.outdir.ends_with("results/random/noise_0.1/bsc-a"));
        assert!(layout.log_path().ends_with("noise_0.1/bsc-a/log.txt"));
    }

    #[test]
    fn test_create_is_idempotent_and_config_dump_round_trips() {
        let dir    = tempfile::tempdir().unwrap();
        let cfg    = config(dir.path());
        let layout = RunLayout::new(&cfg, "random");
        layout.create().unwrap();
        layout.create().unwrap();

        let path = layout.dump_config(&cfg).unwrap();
        let back: NecstConfig = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }
}

// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration     (Layer 3 - domain)
//   Step 2: Load, clean and split data     (Layer 4 - data)
//   Step 3: Create run directories         (Layer 6 - infra)
//   Step 4: Dump config, open log.txt      (Layer 6 - infra)
//   Step 5: Pick the checkpoint to resume  (Layer 6 - infra)
//   Step 6: Run the training loop          (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;

use crate::application::prepare::prepare_data;
use crate::data::dataset::ExampleDataset;
use crate::domain::{config::NecstConfig, error::NecstError};
use crate::infra::{
    checkpoint::{CheckpointHandle, CheckpointManager},
    layout::RunLayout,
    metrics::MetricsLogger,
    run_log::RunLog,
};
use crate::ml::{
    backend::{select_device, TrainBackend},
    trainer::{run_training, TrainOutcome, TrainRun},
};

/// What a finished training run leaves behind
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub layout:  RunLayout,
    pub outcome: TrainOutcome,
}

pub struct TrainUseCase {
    config: NecstConfig,
}

impl TrainUseCase {
    pub fn new(config: NecstConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Data ──────────────────────────────────────────────────────
        let data = prepare_data(cfg)?;

        // ── Step 3 + 4: Layout, config dump, run log ──────────────────────────
        let layout = RunLayout::new(cfg, &data.source_name);
        layout.create()?;
        let mut log = if cfg.dump {
            let path = layout.dump_config(cfg)?;
            tracing::info!("Configuration written to '{}'", path.display());
            RunLog::open(Some(layout.log_path()))?
        } else {
            RunLog::disabled()
        };
        let checkpoints = CheckpointManager::new(&layout.logdir)?;
        let metrics     = MetricsLogger::new(&layout.logdir)?;
        tracing::info!(
            "Metrics: '{}' and '{}'",
            metrics.csv_path().display(),
            metrics.jsonl_path().display(),
        );

        // ── Step 5: Resume target ─────────────────────────────────────────────
        let resume = resume_target(cfg, &checkpoints)?;

        // ── Step 6: Train (Layer 5) ───────────────────────────────────────────
        let run = TrainRun {
            cfg,
            train: ExampleDataset::new(data.splits.train),
            valid: ExampleDataset::new(data.splits.valid),
            checkpoints: &checkpoints,
            metrics: &metrics,
            log: &mut log,
            resume,
        };
        let outcome = run_training::<TrainBackend>(run, select_device(cfg.gpu_id))?;

        tracing::info!("Training complete after {} steps", outcome.final_step);
        Ok(TrainReport { layout, outcome })
    }
}

/// `--ckpt` when given, otherwise the newest checkpoint of this run
pub fn resume_target(cfg: &NecstConfig, checkpoints: &CheckpointManager) -> Result<Option<CheckpointHandle>> {
    if !cfg.resume {
        return Ok(None);
    }
    let handle = match &cfg.ckpt {
        Some(reference) => checkpoints.resolve(reference)?,
        None => checkpoints.latest()?.ok_or_else(|| {
            NecstError::config(format!(
                "--resume given but no checkpoint exists in '{}'",
                checkpoints.dir().display()
            ))
        })?,
    };
    Ok(Some(handle))
}

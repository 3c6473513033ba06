// ============================================================
// Layer 2 — AnalyzeUseCase
// ============================================================
// Evaluates a trained checkpoint and writes the results under
// the run's outdir:
//
//   Step 1: Find the best checkpoint        (Layer 6 - infra)
//   Step 2: Rebuild the model, load weights (Layer 5 - ml)
//   Step 3: Test split report               → test_report.json
//   Step 4: Reconstructions                 → reconstructions.json
//   Step 5: Markov chain from a test input  → markov_chain.json
//   Step 6: Samples from random codes       → samples.json
//
// Best checkpoint, first match wins:
//   --ckpt → training outcome → best.json → log.txt scan
//          → latest.json → configuration error

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::application::prepare::prepare_data;
use crate::data::{dataset::ExampleDataset, loader::load_examples, preprocessor::Preprocessor};
use crate::domain::{config::NecstConfig, error::NecstError};
use crate::infra::{
    checkpoint::{write_json_atomic, BestRecord, CheckpointHandle, CheckpointManager},
    layout::RunLayout,
    run_log::{scan_best_checkpoint, RunLog},
};
use crate::ml::{
    analyzer::{Analyzer, TestReport},
    backend::{select_device, InferBackend},
};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub checkpoint: String,
    pub test:       TestReport,
    pub outputs:    Vec<PathBuf>,
}

pub struct AnalyzeUseCase {
    config: NecstConfig,
}

impl AnalyzeUseCase {
    pub fn new(config: NecstConfig) -> Self {
        Self { config }
    }

    /// `trained` is the best checkpoint of a training run that just finished
    pub fn execute(&self, trained: Option<&BestRecord>) -> Result<AnalysisReport> {
        let cfg = &self.config;
        cfg.validate()?;

        let data   = prepare_data(cfg)?;
        let layout = RunLayout::new(cfg, &data.source_name);
        layout.create()?;
        let mut log = if cfg.dump { RunLog::open(Some(layout.log_path()))? } else { RunLog::disabled() };
        let checkpoints = CheckpointManager::new(&layout.logdir)?;

        // ── Step 1 + 2: Checkpoint and model ──────────────────────────────────
        let handle   = resolve_best_checkpoint(cfg, &layout, &checkpoints, trained)?;
        let device   = select_device(cfg.gpu_id);
        let analyzer = Analyzer::<InferBackend>::from_checkpoint(&checkpoints, &handle, cfg, device)?;
        log.line(format!(
            "Analysing {handle} over {} with p={}",
            cfg.channel, cfg.analysis_noise(),
        ))?;

        let test_examples = data.splits.test;
        let mut outputs   = Vec::new();

        // ── Step 3: Test report ───────────────────────────────────────────────
        let test = analyzer.test(ExampleDataset::new(test_examples.clone()))?;
        log.line(format!(
            "Test: loss={:.4} | log_likelihood={:.4} | reconstruction_error={:.4} | bit_error_rate={:.4}",
            test.loss, test.log_likelihood, test.reconstruction_error, test.bit_error_rate,
        ))?;
        outputs.push(write(&layout, "test_report.json", &test)?);

        // ── Step 4: Reconstructions ───────────────────────────────────────────
        let recon_inputs = match &cfg.recon_file {
            Some(path) => {
                let mut examples = load_examples(path)?;
                Preprocessor::new(cfg.is_binary).prepare(&mut examples);
                examples
            }
            None => test_examples.clone(),
        };
        let recons = analyzer.reconstruct(&recon_inputs)?;
        outputs.push(write(&layout, "reconstructions.json", &recons)?);

        // ── Step 5: Markov chain ──────────────────────────────────────────────
        match recon_inputs.first().or(test_examples.first()) {
            Some(start) => {
                let trace = analyzer.markov_chain(start, cfg.total_mcmc_steps, cfg.mcmc_record_every)?;
                log.line(format!(
                    "Markov chain: fixed point at {:?}, cycle {:?}",
                    trace.fixed_point_at, trace.cycle,
                ))?;
                outputs.push(write(&layout, "markov_chain.json", &trace)?);
            }
            None => log.warn("no example to start the Markov chain from")?,
        }

        // ── Step 6: Samples ───────────────────────────────────────────────────
        let samples = analyzer.generate(cfg.num_samples)?;
        outputs.push(write(&layout, "samples.json", &samples)?);

        let report = AnalysisReport { checkpoint: handle.to_string(), test, outputs };
        write(&layout, "analysis.json", &report)?;
        Ok(report)
    }
}

fn write<T: Serialize>(layout: &RunLayout, name: &str, value: &T) -> Result<PathBuf> {
    let path = layout.output(name);
    write_json_atomic(&path, value)?;
    tracing::info!("Wrote '{}'", path.display());
    Ok(path)
}

/// First available of: --ckpt, the just-trained best, best.json,
/// the newest restore line of log.txt, latest.json
pub fn resolve_best_checkpoint(
    cfg:         &NecstConfig,
    layout:      &RunLayout,
    checkpoints: &CheckpointManager,
    trained:     Option<&BestRecord>,
) -> Result<CheckpointHandle> {
    if let Some(reference) = &cfg.ckpt {
        return checkpoints.resolve(reference);
    }
    if let Some(best) = trained {
        return checkpoints.resolve(&best.path.display().to_string());
    }
    if let Some(best) = checkpoints.best()? {
        return checkpoints.resolve(&best.path.display().to_string());
    }
    if let Some(reference) = scan_best_checkpoint(&layout.log_path())? {
        tracing::info!("best.json missing, using the checkpoint named in log.txt");
        return checkpoints.resolve(&reference);
    }
    if let Some(handle) = checkpoints.latest()? {
        tracing::warn!("No best checkpoint recorded, falling back to the latest one");
        return Ok(handle);
    }
    Err(NecstError::config(format!(
        "no checkpoint to analyse in '{}': train first or pass --ckpt",
        checkpoints.dir().display()
    ))
    .into())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::infra::{
        checkpoint::{checkpoint_id, CheckpointMeta},
        run_log::restore_line,
    };
    use std::{fs, path::Path};

    fn config(root: &Path) -> NecstConfig {
        NecstConfig {
            logdir:            root.join("models").display().to_string(),
            outdir:            root.join("results").display().to_string(),
            synthetic_size:    60,
            input_dim:         8,
            n_bits:            4,
            enc_arch:          vec![8],
            dec_arch:          vec![8],
            n_epochs:          1,
            batch_size:        16,
            log_interval:      2,
            is_binary:         true,
            vimco_samples:     2,
            num_samples:       3,
            total_mcmc_steps:  20,
            mcmc_record_every: 5,
            ..NecstConfig::default()
        }
    }

    fn publish(store: &CheckpointManager, step: usize) -> CheckpointHandle {
        let handle = store.handle(checkpoint_id(step));
        let meta = CheckpointMeta {
            id: handle.id.clone(),
            epoch: 0,
            next_batch: step,
            step,
            train_loss: 1.0,
            valid_loss: 1.0,
            best: None,
        };
        write_json_atomic(&handle.meta_path(), &meta).unwrap();
        write_json_atomic(&store.dir().join("latest.json"), &handle.id).unwrap();
        handle
    }

    #[test]
    fn test_resolution_order() {
        let dir    = tempfile::tempdir().unwrap();
        let cfg    = config(dir.path());
        let layout = RunLayout::new(&cfg, "random");
        layout.create().unwrap();
        let store  = CheckpointManager::new(&layout.logdir).unwrap();

        // nothing at all
        assert!(resolve_best_checkpoint(&cfg, &layout, &store, None).is_err());

        // latest.json only
        let h1 = publish(&store, 1);
        let h2 = publish(&store, 2);
        assert_eq!(resolve_best_checkpoint(&cfg, &layout, &store, None).unwrap(), h2);

        // log.txt beats latest.json
        fs::write(layout.log_path(), format!("{}\n", restore_line(0, 0.5, &h1.id))).unwrap();
        assert_eq!(resolve_best_checkpoint(&cfg, &layout, &store, None).unwrap(), h1);

        // best.json beats log.txt
        let best = BestRecord { id: h2.id.clone(), path: h2.meta_path(), epoch: 0, step: 2, valid_loss: 0.4 };
        store.record_best(&best).unwrap();
        assert_eq!(resolve_best_checkpoint(&cfg, &layout, &store, None).unwrap(), h2);

        // training outcome beats best.json
        let trained = BestRecord { id: h1.id.clone(), path: h1.meta_path(), ..best };
        assert_eq!(resolve_best_checkpoint(&cfg, &layout, &store, Some(&trained)).unwrap(), h1);

        // --ckpt beats everything
        let cfg = NecstConfig { ckpt: Some(h2.id.clone()), ..cfg };
        assert_eq!(resolve_best_checkpoint(&cfg, &layout, &store, Some(&trained)).unwrap(), h2);
    }

    #[test]
    fn test_train_then_analyze_writes_outputs() {
        let dir     = tempfile::tempdir().unwrap();
        let cfg     = config(dir.path());
        let trained = TrainUseCase::new(cfg.clone()).execute().unwrap();
        let report  = AnalyzeUseCase::new(cfg).execute(trained.outcome.best.as_ref()).unwrap();

        assert_eq!(report.outputs.len(), 4);
        assert!(report.outputs.iter().all(|p| p.is_file()));
        assert!(report.test.loss.is_finite());

        let samples: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(trained.layout.output("samples.json")).unwrap()).unwrap();
        assert_eq!(samples.as_array().map(Vec::len), Some(3));
    }
}

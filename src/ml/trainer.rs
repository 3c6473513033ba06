// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-based train / validate / checkpoint loop.
//
//   for epoch in start..n_epochs
//     for batch in train split (seeded shuffle per epoch)
//       surrogate = estimator(model, batch, channel, noise[step])
//       backward → optimiser step
//       every log_interval steps:
//         valid loss on the inner backend (no autodiff)
//         checkpoint model + optimiser + progress
//         best.json if valid loss strictly improved
//   final checkpoint if steps ran since the last one
//   log the best checkpoint
//
// Key burn points:
//   - Training runs on B (Autodiff<...>) for gradients
//   - model.valid() returns the model on B::InnerBackend,
//     which validation and the validation datasource use
//   - The optimiser type differs per --optimizer, so the loop
//     is generic over it and `run_training` picks one
//
// A resumed run restores weights, optimiser state, progress and
// best-so-far, skips the batches of the interrupted epoch it had
// already consumed, and continues the global step count. Noise is
// keyed by step, so it sees exactly the draws the uninterrupted
// run would have.
//
// Reference: Burn Book §5, Mnih & Rezende (2016) VIMCO

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{momentum::MomentumConfig, AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{dataset::ExampleDataset, source::Datasource};
use crate::domain::{
    config::{NecstConfig, OptimizerKind},
    error::NecstError,
    example::InputDomain,
};
use crate::infra::{
    checkpoint::{checkpoint_id, BestRecord, CheckpointHandle, CheckpointManager, CheckpointMeta},
    metrics::{IntervalMetrics, MetricsLogger},
    run_log::{restore_line, RunLog},
};
use crate::ml::{
    channel::NoisyChannel,
    estimator::build_estimator,
    model::{Necst, NecstModelConfig},
    noise::{NoiseSource, NoiseStream},
    objective::evaluate_split,
};

/// Everything one training run reads from and writes to
pub struct TrainRun<'a> {
    pub cfg:         &'a NecstConfig,
    pub train:       ExampleDataset,
    pub valid:       ExampleDataset,
    pub checkpoints: &'a CheckpointManager,
    pub metrics:     &'a MetricsLogger,
    pub log:         &'a mut RunLog,
    pub resume:      Option<CheckpointHandle>,
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub history:       Vec<IntervalMetrics>,
    pub best:          Option<BestRecord>,
    pub final_step:    usize,
    pub skipped_steps: usize,
}

pub fn run_training<B: AutodiffBackend>(run: TrainRun<'_>, device: B::Device) -> Result<TrainOutcome> {
    match run.cfg.optimizer {
        OptimizerKind::Adam => {
            // m = β1*m + (1-β1)*g, v = β2*v + (1-β2)*g², θ -= lr * m / (√v + ε)
            let optim = AdamConfig::new().with_epsilon(1e-8).init::<B, Necst<B>>();
            train_loop(run, device, optim)
        }
        OptimizerKind::Sgd => {
            let optim = SgdConfig::new().init::<B, Necst<B>>();
            train_loop(run, device, optim)
        }
        OptimizerKind::Momentum => {
            let momentum = MomentumConfig::new().with_momentum(0.9);
            let optim = SgdConfig::new().with_momentum(Some(momentum)).init::<B, Necst<B>>();
            train_loop(run, device, optim)
        }
    }
}

// ─── Loop state ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Progress {
    epoch:       usize,
    next_batch:  usize,
    step:        usize,
    last_logged: usize,
    loss_sum:    f64,
    loss_count:  usize,
    skipped:     usize,
    best:        Option<BestRecord>,
    history:     Vec<IntervalMetrics>,
}

impl Progress {
    fn resumed(meta: &CheckpointMeta) -> Self {
        Self {
            epoch:       meta.epoch,
            next_batch:  meta.next_batch,
            step:        meta.step,
            last_logged: meta.step,
            best:        meta.best.clone(),
            ..Self::default()
        }
    }

    fn record_loss(&mut self, loss: f64) {
        self.loss_sum   += loss;
        self.loss_count += 1;
    }

    /// Mean training loss since the last interval, NaN if every step was skipped
    fn take_train_loss(&mut self) -> f64 {
        let mean = if self.loss_count > 0 { self.loss_sum / self.loss_count as f64 } else { f64::NAN };
        self.loss_sum   = 0.0;
        self.loss_count = 0;
        mean
    }
}

/// Where interval results go
struct Sinks<'a> {
    cfg:         &'a NecstConfig,
    checkpoints: &'a CheckpointManager,
    metrics:     &'a MetricsLogger,
    log:         &'a mut RunLog,
}

// ─── Loop ────────────────────────────────────────────────────────────────────

fn train_loop<B, O>(run: TrainRun<'_>, device: B::Device, mut optim: O) -> Result<TrainOutcome>
where
    B: AutodiffBackend,
    O: Optimizer<Necst<B>, B>,
{
    let TrainRun { cfg, train, valid, checkpoints, metrics, log, resume } = run;
    let mut sinks = Sinks { cfg, checkpoints, metrics, log };

    // ── Build or restore model ────────────────────────────────────────────────
    let domain    = InputDomain::from_flag(cfg.is_binary);
    let model_cfg = NecstModelConfig::from_run(cfg, train.input_dim(), domain);
    checkpoints.save_model_config(&model_cfg)?;

    B::seed(cfg.seed);
    let mut model: Necst<B> = model_cfg.init(&device);
    let mut progress = Progress::default();

    if let Some(handle) = &resume {
        let meta = checkpoints.read_meta(handle)?;
        model    = checkpoints.load_model::<B, _>(handle, model, &device)?;
        optim    = optim.load_record(checkpoints.load_optimizer::<B, O::Record>(handle, &device)?);
        progress = Progress::resumed(&meta);
        sinks.log.line(format!(
            "Resuming from {handle} at epoch {}, step {} (batch {} of the epoch)",
            meta.epoch, meta.step, meta.next_batch,
        ))?;
    }

    let estimator = build_estimator::<B>(cfg);
    let channel   = NoisyChannel::new(cfg.channel, cfg.noise);

    let mut train_src = Datasource::<B>::new(train, cfg.batch_size, true, cfg.seed, device.clone());
    let mut valid_src = Datasource::<B::InnerBackend>::new(valid, cfg.batch_size, false, cfg.seed, device);

    sinks.log.line(format!(
        "Training NECST ({} gradients, {} channel p={}): {} train / {} valid examples, {} batches per epoch",
        estimator.name(), cfg.channel, cfg.noise,
        train_src.len(), valid_src.len(), train_src.batches_per_epoch(),
    ))?;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let start_epoch = progress.epoch;
    for epoch in start_epoch..cfg.n_epochs {
        progress.epoch = epoch;
        train_src.start_epoch(epoch);
        if epoch == start_epoch && progress.next_batch > 0 {
            train_src.skip_batches(progress.next_batch);
        } else {
            progress.next_batch = 0;
        }

        while let Some(batch) = train_src.next_batch()? {
            progress.next_batch += 1;
            progress.step       += 1;

            let mut noise = NoiseSource::for_step(cfg.seed, progress.step, NoiseStream::Train);
            let objective = estimator.objective(&model, batch.inputs, &channel, &mut noise, progress.step)?;
            tracing::debug!(
                "Step {} loss={:.4} log_likelihood={:.4} reg={:.6}",
                progress.step, objective.loss, objective.log_likelihood, objective.regularization,
            );

            if objective.loss.is_finite() {
                let grads = GradientsParams::from_grads(objective.surrogate.backward(), &model);
                model = optim.step(cfg.lr, model, grads);
                progress.record_loss(objective.loss);
            } else {
                let err = NecstError::NumericalInstability { step: progress.step, value: objective.loss };
                sinks.log.warn(format!("{err}; update skipped"))?;
                progress.skipped += 1;
            }

            if progress.step % cfg.log_interval == 0 {
                checkpoint_interval(&mut sinks, &model, &optim, &mut valid_src, &channel, &mut progress)?;
            }
        }
    }

    if progress.step > progress.last_logged {
        checkpoint_interval(&mut sinks, &model, &optim, &mut valid_src, &channel, &mut progress)?;
    }

    match &progress.best {
        Some(best) => {
            let reference = best.path.display().to_string();
            sinks.log.line(restore_line(best.epoch, best.valid_loss, &reference))?;
        }
        None => sinks.log.warn("training finished without a finite validation loss")?,
    }
    if progress.skipped > 0 {
        sinks.log.warn(format!("{} steps skipped on non-finite loss", progress.skipped))?;
    }

    Ok(TrainOutcome {
        history:       progress.history,
        best:          progress.best,
        final_step:    progress.step,
        skipped_steps: progress.skipped,
    })
}

/// Validate, checkpoint, and update best-so-far at the current step
fn checkpoint_interval<B, O>(
    sinks:     &mut Sinks<'_>,
    model:     &Necst<B>,
    optim:     &O,
    valid_src: &mut Datasource<B::InnerBackend>,
    channel:   &NoisyChannel,
    progress:  &mut Progress,
) -> Result<()>
where
    B: AutodiffBackend,
    O: Optimizer<Necst<B>, B>,
{
    let cfg  = sinks.cfg;
    let step = progress.step;

    let train_loss = progress.take_train_loss();
    let mut noise  = NoiseSource::for_step(cfg.seed, step, NoiseStream::Eval);
    let valid_loss = evaluate_split(
        &model.valid(), valid_src, channel, cfg.vimco_samples, &mut noise, cfg.reg_param,
    )?
    .loss;

    let id      = checkpoint_id(step);
    let handle  = sinks.checkpoints.handle(id.clone());
    let is_best = valid_loss.is_finite()
        && progress.best.as_ref().map_or(true, |b| valid_loss < b.valid_loss);
    if is_best {
        progress.best = Some(BestRecord {
            id:         id.clone(),
            path:       handle.meta_path(),
            epoch:      progress.epoch,
            step,
            valid_loss,
        });
    }

    let meta = CheckpointMeta {
        id,
        epoch:      progress.epoch,
        next_batch: progress.next_batch,
        step,
        train_loss,
        valid_loss,
        best:       progress.best.clone(),
    };
    sinks.checkpoints.save::<B, _, _>(model, optim.to_record(), &meta)?;
    if let (true, Some(best)) = (is_best, &progress.best) {
        sinks.checkpoints.record_best(best)?;
    }

    let row = IntervalMetrics { epoch: progress.epoch, step, train_loss, valid_loss, is_best };
    sinks.metrics.log(&row)?;
    sinks.log.line(format!(
        "Epoch {} step {} | train_loss={:.4} | valid_loss={:.4}{}",
        progress.epoch, step, train_loss, valid_loss, if is_best { " | new best" } else { "" },
    ))?;

    progress.last_logged = step;
    progress.history.push(row);
    Ok(())
}

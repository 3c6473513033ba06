// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands share one set of flags:
//
//   train    — train a model, checkpointing as it goes
//   analyze  — evaluate the best checkpoint of a run
//   run      — train, then analyze what was just trained
//
// clap's derive macros generate --help, error messages and
// type conversion. The option enums (channel, activation, ...)
// parse through their FromStr impls in the domain layer.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{ArgAction, Args, Subcommand};
use std::path::PathBuf;

use crate::domain::{
    config::{
        parse_arch, Activation, ChannelKind, DatasourceKind, ModelKind, NecstConfig, OptimizerKind,
        VimcoObjective,
    },
    error::NecstError,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a NECST model
    Train(RunArgs),

    /// Analyse the best checkpoint of a run
    Analyze(RunArgs),

    /// Train, then analyse the result
    Run(RunArgs),
}

/// Every flag of a run. Each field becomes a --flag on the command line.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    // ── Data and bookkeeping ──────────────────────────────────────────────────
    /// Example source: "random" (seeded synthetic bits) or "file"
    #[arg(long, default_value = "random")]
    pub datasource: DatasourceKind,

    /// JSON examples for the "file" datasource
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// JSON examples to reconstruct during analysis (default: test split)
    #[arg(long)]
    pub recon_file: Option<PathBuf>,

    /// Root directory for checkpoints and metrics
    #[arg(long, default_value = "./models")]
    pub logdir: String,

    /// Root directory for config dump, log.txt and analysis outputs
    #[arg(long, default_value = "./results")]
    pub outdir: String,

    /// Continue from --ckpt, or from the latest checkpoint of this run
    #[arg(long)]
    pub resume: bool,

    /// Checkpoint id (ckpt-00000500) or path to its .json metadata
    #[arg(long)]
    pub ckpt: Option<String>,

    #[arg(long, default_value = "0")]
    pub exp_id: String,

    /// Device index; only meaningful with the `wgpu` feature
    #[arg(long, default_value_t = 0)]
    pub gpu_id: usize,

    /// Write config.json and log.txt
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub dump: bool,

    // ── Latent code ───────────────────────────────────────────────────────────
    /// Inputs are bit vectors (Bernoulli decoder) rather than values in [0, 1]
    #[arg(long)]
    pub is_binary: bool,

    /// Train through relaxed Bernoulli codes instead of VIMCO
    #[arg(long)]
    pub discrete_relax: bool,

    /// Samples per example for VIMCO and for evaluation
    #[arg(long, default_value_t = 5)]
    pub vimco_samples: usize,

    /// Multi-sample objective: "mean" or "log-mean-exp"
    #[arg(long, default_value = "mean")]
    pub vimco_objective: VimcoObjective,

    /// Initial relaxation temperature
    #[arg(long, default_value_t = 1.0)]
    pub temperature: f64,

    #[arg(long, default_value_t = 0.5)]
    pub min_temperature: f64,

    /// Exponential temperature decay per step
    #[arg(long, default_value_t = 1e-4)]
    pub anneal_rate: f64,

    // ── Channel ───────────────────────────────────────────────────────────────
    /// "bsc" (bit flips) or "bec" (erasures)
    #[arg(long, default_value = "bsc")]
    pub channel_model: ChannelKind,

    /// Corruption probability per bit during training
    #[arg(long, default_value_t = 0.0)]
    pub noise: f32,

    /// Corruption probability during analysis (default: --noise)
    #[arg(long)]
    pub test_noise: Option<f32>,

    // ── Training ──────────────────────────────────────────────────────────────
    #[arg(long, default_value_t = 10)]
    pub n_epochs: usize,

    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// "adam", "sgd" or "momentum"
    #[arg(long, default_value = "adam")]
    pub optimizer: OptimizerKind,

    /// Steps between validation + checkpoint
    #[arg(long, default_value_t = 500)]
    pub log_interval: usize,

    /// Samples generated from random codes during analysis
    #[arg(long, default_value_t = 16)]
    pub num_samples: usize,

    // ── Model ─────────────────────────────────────────────────────────────────
    #[arg(long, default_value = "necst")]
    pub model: ModelKind,

    /// sigmoid, tanh, softplus, leakyrelu or relu
    #[arg(long, default_value = "relu")]
    pub activation: Activation,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Comma-separated encoder hidden widths, e.g. "500" ("" for none)
    #[arg(long, default_value = "500")]
    pub enc_arch: String,

    /// Comma-separated decoder hidden widths
    #[arg(long, default_value = "500,500")]
    pub dec_arch: String,

    /// Code length in bits
    #[arg(long, default_value_t = 100)]
    pub n_bits: usize,

    /// L2 penalty on encoder weights
    #[arg(long, default_value_t = 1e-4)]
    pub reg_param: f64,

    /// Apply the activation after the last encoder hidden layer too
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub non_linear_act: bool,

    // ── Analysis ──────────────────────────────────────────────────────────────
    #[arg(long, default_value_t = 9000)]
    pub total_mcmc_steps: usize,

    #[arg(long, default_value_t = 1000)]
    pub mcmc_record_every: usize,

    // ── Synthetic data ────────────────────────────────────────────────────────
    /// Number of vectors the "random" datasource generates
    #[arg(long, default_value_t = 1000)]
    pub synthetic_size: usize,

    /// Dimensionality of the "random" datasource
    #[arg(long, default_value_t = 64)]
    pub input_dim: usize,
}

/// The boundary between Layer 1 and the rest: nothing past here sees clap types.
impl TryFrom<RunArgs> for NecstConfig {
    type Error = NecstError;

    fn try_from(a: RunArgs) -> Result<Self, Self::Error> {
        Ok(NecstConfig {
            datasource:        a.datasource,
            data_file:         a.data_file,
            recon_file:        a.recon_file,
            logdir:            a.logdir,
            outdir:            a.outdir,
            resume:            a.resume,
            ckpt:              a.ckpt,
            exp_id:            a.exp_id,
            gpu_id:            a.gpu_id,
            dump:              a.dump,
            is_binary:         a.is_binary,
            discrete_relax:    a.discrete_relax,
            vimco_samples:     a.vimco_samples,
            vimco_objective:   a.vimco_objective,
            temperature:       a.temperature,
            min_temperature:   a.min_temperature,
            anneal_rate:       a.anneal_rate,
            channel:           a.channel_model,
            noise:             a.noise,
            test_noise:        a.test_noise,
            n_epochs:          a.n_epochs,
            batch_size:        a.batch_size,
            lr:                a.lr,
            optimizer:         a.optimizer,
            log_interval:      a.log_interval,
            num_samples:       a.num_samples,
            model:             a.model,
            activation:        a.activation,
            seed:              a.seed,
            enc_arch:          parse_arch(&a.enc_arch)?,
            dec_arch:          parse_arch(&a.dec_arch)?,
            n_bits:            a.n_bits,
            reg_param:         a.reg_param,
            non_linear_act:    a.non_linear_act,
            total_mcmc_steps:  a.total_mcmc_steps,
            mcmc_record_every: a.mcmc_record_every,
            synthetic_size:    a.synthetic_size,
            input_dim:         a.input_dim,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Train(a) | Commands::Analyze(a) | Commands::Run(a) => a,
        }
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let cfg = NecstConfig::try_from(parse(&["necst", "train"])).unwrap();
        assert_eq!(cfg, NecstConfig::default());
    }

    #[test]
    fn test_flags_reach_config() {
        let args = parse(&[
            "necst", "run",
            "--channel-model", "bec",
            "--noise", "0.1",
            "--enc-arch", "",
            "--dec-arch", "64,32",
            "--vimco-objective", "log-mean-exp",
            "--optimizer", "momentum",
            "--is-binary",
            "--non-linear-act", "false",
            "--dump", "false",
            "--ckpt", "ckpt-00000500",
        ]);
        let cfg = NecstConfig::try_from(args).unwrap();
        assert_eq!(cfg.channel, ChannelKind::Bec);
        assert_eq!(cfg.noise, 0.1);
        assert!(cfg.enc_arch.is_empty());
        assert_eq!(cfg.dec_arch, vec![64, 32]);
        assert_eq!(cfg.vimco_objective, VimcoObjective::LogMeanExp);
        assert_eq!(cfg.optimizer, OptimizerKind::Momentum);
        assert!(cfg.is_binary && !cfg.non_linear_act && !cfg.dump);
        assert_eq!(cfg.ckpt.as_deref(), Some("ckpt-00000500"));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(Cli::try_parse_from(["necst", "train", "--channel-model", "awgn"]).is_err());
        let args = parse(&["necst", "train", "--enc-arch", "10,x"]);
        assert!(matches!(NecstConfig::try_from(args), Err(NecstError::Configuration(_))));
    }
}

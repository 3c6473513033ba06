// ============================================================
// Layer 3 — Run Configuration
// ============================================================
// Every knob of a NECST run, gathered into one immutable struct.
// The CLI builds it once (see cli::commands), `validate()` rejects
// nonsense up front, and from then on every component receives
// `&NecstConfig`. Nothing mutates it after startup.
//
// The small enums here (channel, activation, optimiser, ...) are
// closed sets parsed from their command-line names with FromStr,
// so clap can use them directly as value parsers.
//
// Reference: Rust Book §6 (Enums), §9 (Recoverable Errors)

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};

use crate::domain::error::NecstError;

// ─── Closed option sets ──────────────────────────────────────────────────────

/// Corruption model applied to the transmitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Binary symmetric channel: each bit flips with probability p
    Bsc,
    /// Binary erasure channel: each bit is erased with probability p
    Bec,
}

/// Hidden-layer nonlinearity for encoder and decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Sigmoid,
    Tanh,
    Softplus,
    LeakyRelu,
    Relu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Adam,
    Momentum,
}

/// Multi-sample objective the score-function estimator optimises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VimcoObjective {
    /// Arithmetic mean of the K log-likelihoods
    Mean,
    /// log (1/K) Σ exp(f_k), the importance-weighted bound of Mnih & Rezende
    LogMeanExp,
}

/// Where the examples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    /// Fixed, seeded binary vectors generated in memory
    Random,
    /// Vectors read from a JSON file (`--data-file`)
    File,
}

/// The model families this binary can train. Only NECST today; adding a
/// variant means adding a match arm, never a string lookup at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Necst,
}

macro_rules! named_enum {
    ($ty:ty, $what:literal, { $($name:literal => $variant:path),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = NecstError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(NecstError::config(format!(
                        concat!("unknown ", $what, " '{}' (expected one of: {})"),
                        other,
                        [$($name),+].join(", "),
                    ))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($variant => $name,)+
                };
                f.write_str(name)
            }
        }
    };
}

named_enum!(ChannelKind, "channel model", { "bsc" => ChannelKind::Bsc, "bec" => ChannelKind::Bec });
named_enum!(Activation, "activation", {
    "sigmoid"   => Activation::Sigmoid,
    "tanh"      => Activation::Tanh,
    "softplus"  => Activation::Softplus,
    "leakyrelu" => Activation::LeakyRelu,
    "relu"      => Activation::Relu,
});
named_enum!(OptimizerKind, "optimizer", {
    "sgd"      => OptimizerKind::Sgd,
    "adam"     => OptimizerKind::Adam,
    "momentum" => OptimizerKind::Momentum,
});
named_enum!(VimcoObjective, "vimco objective", {
    "mean"         => VimcoObjective::Mean,
    "log-mean-exp" => VimcoObjective::LogMeanExp,
});
named_enum!(DatasourceKind, "datasource", { "random" => DatasourceKind::Random, "file" => DatasourceKind::File });
named_enum!(ModelKind, "model", { "necst" => ModelKind::Necst });

/// Parse a comma-separated list of layer widths.
/// The empty string is a valid, empty architecture.
pub fn parse_arch(arch: &str) -> Result<Vec<usize>, NecstError> {
    let arch = arch.trim();
    if arch.is_empty() {
        return Ok(Vec::new());
    }
    arch.split(',')
        .map(|w| {
            let w = w.trim();
            match w.parse::<usize>() {
                Ok(0) | Err(_) => Err(NecstError::config(format!(
                    "invalid layer width '{w}' in architecture '{arch}'"
                ))),
                Ok(n) => Ok(n),
            }
        })
        .collect()
}

// ─── NecstConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NecstConfig {
    // files and run bookkeeping
    pub datasource:        DatasourceKind,
    pub data_file:         Option<PathBuf>,
    pub recon_file:        Option<PathBuf>,
    pub logdir:            String,
    pub outdir:            String,
    pub resume:            bool,
    pub ckpt:              Option<String>,
    pub exp_id:            String,
    pub gpu_id:            usize,
    pub dump:              bool,

    // latent code
    pub is_binary:         bool,
    pub discrete_relax:    bool,
    pub vimco_samples:     usize,
    pub vimco_objective:   VimcoObjective,
    pub temperature:       f64,
    pub min_temperature:   f64,
    pub anneal_rate:       f64,

    // channel
    pub channel:           ChannelKind,
    pub noise:             f32,
    pub test_noise:        Option<f32>,

    // training
    pub n_epochs:          usize,
    pub batch_size:        usize,
    pub lr:                f64,
    pub optimizer:         OptimizerKind,
    pub log_interval:      usize,
    pub num_samples:       usize,

    // model
    pub model:             ModelKind,
    pub activation:        Activation,
    pub seed:              u64,
    pub enc_arch:          Vec<usize>,
    pub dec_arch:          Vec<usize>,
    pub n_bits:            usize,
    pub reg_param:         f64,
    pub non_linear_act:    bool,

    // analysis
    pub total_mcmc_steps:  usize,
    pub mcmc_record_every: usize,

    // synthetic "random" datasource
    pub synthetic_size:    usize,
    pub input_dim:         usize,
}

impl Default for NecstConfig {
    fn default() -> Self {
        Self {
            datasource:        DatasourceKind::Random,
            data_file:         None,
            recon_file:        None,
            logdir:            "./models".to_string(),
            outdir:            "./results".to_string(),
            resume:            false,
            ckpt:              None,
            exp_id:            "0".to_string(),
            gpu_id:            0,
            dump:              true,

            is_binary:         false,
            discrete_relax:    false,
            vimco_samples:     5,
            vimco_objective:   VimcoObjective::Mean,
            temperature:       1.0,
            min_temperature:   0.5,
            anneal_rate:       1e-4,

            channel:           ChannelKind::Bsc,
            noise:             0.0,
            test_noise:        None,

            n_epochs:          10,
            batch_size:        100,
            lr:                1e-3,
            optimizer:         OptimizerKind::Adam,
            log_interval:      500,
            num_samples:       16,

            model:             ModelKind::Necst,
            activation:        Activation::Relu,
            seed:              0,
            enc_arch:          vec![500],
            dec_arch:          vec![500, 500],
            n_bits:            100,
            reg_param:         1e-4,
            non_linear_act:    true,

            total_mcmc_steps:  9000,
            mcmc_record_every: 1000,

            synthetic_size:    1000,
            input_dim:         64,
        }
    }
}

impl NecstConfig {
    /// Reject values that would make a run meaningless or numerically unsafe.
    pub fn validate(&self) -> Result<(), NecstError> {
        fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<(), NecstError> {
            if ok { Ok(()) } else { Err(NecstError::Configuration(msg())) }
        }

        check((0.0..=1.0).contains(&self.noise), || {
            format!("noise must lie in [0, 1], got {}", self.noise)
        })?;
        if let Some(t) = self.test_noise {
            check((0.0..=1.0).contains(&t), || format!("test_noise must lie in [0, 1], got {t}"))?;
        }
        check(self.n_bits > 0, || "n_bits must be positive".into())?;
        check(self.batch_size > 0, || "batch_size must be positive".into())?;
        check(self.vimco_samples > 0, || "vimco_samples must be at least 1".into())?;
        check(self.log_interval > 0, || "log_interval must be positive".into())?;
        check(self.mcmc_record_every > 0, || "mcmc_record_every must be positive".into())?;
        check(self.lr.is_finite() && self.lr > 0.0, || {
            format!("learning rate must be positive, got {}", self.lr)
        })?;
        check(self.reg_param.is_finite() && self.reg_param >= 0.0, || {
            format!("reg_param must be non-negative, got {}", self.reg_param)
        })?;
        check(self.temperature > 0.0 && self.min_temperature > 0.0, || {
            "relaxation temperatures must be positive".into()
        })?;
        check(self.min_temperature <= self.temperature, || {
            format!(
                "min_temperature ({}) exceeds temperature ({})",
                self.min_temperature, self.temperature
            )
        })?;
        check(self.anneal_rate >= 0.0, || "anneal_rate must be non-negative".into())?;
        check(!self.exp_id.trim().is_empty(), || "exp_id must not be empty".into())?;

        match self.datasource {
            DatasourceKind::File => check(self.data_file.is_some(), || {
                "datasource 'file' requires --data-file".into()
            })?,
            DatasourceKind::Random => check(self.synthetic_size > 0 && self.input_dim > 0, || {
                "datasource 'random' requires positive synthetic_size and input_dim".into()
            })?,
        }
        Ok(())
    }

    /// True when codes are sampled through the relaxed-Bernoulli path
    pub fn uses_relaxation(&self) -> bool {
        self.discrete_relax
    }

    /// Noise rate used by the post-training analyzer
    pub fn analysis_noise(&self) -> f32 {
        self.test_noise.unwrap_or(self.noise)
    }

    /// Directory component keyed by noise level, e.g. `noise_0.1`
    pub fn noise_subpath(&self) -> String {
        format!("noise_{:?}", self.noise)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arch_lists() {
        assert_eq!(parse_arch("500,500").unwrap(), vec![500, 500]);
        assert_eq!(parse_arch(" 32 , 16 ").unwrap(), vec![32, 16]);
        assert!(parse_arch("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_arch_rejects_zero_and_garbage() {
        assert!(parse_arch("10,0").is_err());
        assert!(parse_arch("10,,5").is_err());
        assert!(parse_arch("abc").is_err());
    }

    #[test]
    fn test_enum_names_round_trip() {
        assert_eq!("BSC".parse::<ChannelKind>().unwrap(), ChannelKind::Bsc);
        assert_eq!("leakyrelu".parse::<Activation>().unwrap(), Activation::LeakyRelu);
        assert_eq!(OptimizerKind::Momentum.to_string(), "momentum");
        assert_eq!("log-mean-exp".parse::<VimcoObjective>().unwrap(), VimcoObjective::LogMeanExp);
        assert!("gaussian".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        NecstConfig::default().validate().unwrap();
    }

    #[test]
    fn test_noise_out_of_range_is_config_error() {
        let cfg = NecstConfig { noise: 1.5, ..NecstConfig::default() };
        assert!(matches!(cfg.validate(), Err(NecstError::Configuration(_))));
    }

    #[test]
    fn test_file_source_needs_path() {
        let cfg = NecstConfig { datasource: DatasourceKind::File, ..NecstConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_noise_subpath_matches_float_repr() {
        let cfg = NecstConfig { noise: 0.1, ..NecstConfig::default() };
        assert_eq!(cfg.noise_subpath(), "noise_0.1");
        assert_eq!(NecstConfig::default().noise_subpath(), "noise_0.0");
    }

    #[test]
    fn test_analysis_noise_falls_back_to_training_noise() {
        let cfg = NecstConfig { noise: 0.2, ..NecstConfig::default() };
        assert_eq!(cfg.analysis_noise(), 0.2);
        let cfg = NecstConfig { test_noise: Some(0.0), ..cfg };
        assert_eq!(cfg.analysis_noise(), 0.0);
    }
}

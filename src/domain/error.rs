// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Typed failures the rest of the system raises through anyhow.
// Callers that need to react to a specific kind recover it with
// `err.downcast_ref::<NecstError>()`.
//
//   Configuration         — bad or missing option, fatal
//   NumericalInstability  — non-finite loss, step is skipped
//   Io / Checkpoint       — read/write failure, fatal for the operation
//   DataExhausted         — no batch at the start of an epoch, fatal

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum NecstError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("non-finite loss {value} at step {step}")]
    NumericalInstability { step: usize, value: f64 },

    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {path:?}: {message}")]
    Checkpoint { path: PathBuf, message: String },

    #[error("datasource exhausted on the first batch of epoch {epoch}")]
    DataExhausted { epoch: usize },
}

impl NecstError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

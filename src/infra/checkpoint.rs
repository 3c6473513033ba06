// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores everything needed to continue or analyse
// a run, using burn's NamedMpkGzFileRecorder at full precision.
//
// What gets saved per checkpoint (id = ckpt-{step:08}):
//   1. {id}-model.mpk.gz   — model parameters
//   2. {id}-optim.mpk.gz   — optimiser state (moments, step count)
//   3. {id}.json           — progress metadata, written LAST
//
// A checkpoint exists once its metadata file exists. Partially
// written weights without metadata are never picked up.
//
// Run-level files next to the checkpoints:
//   model_config.json      — architecture, to rebuild before loading
//   latest.json            — pointer to the newest checkpoint
//   best.json              — pointer to the lowest validation loss
//
// Pointers and metadata go through write-to-temp + rename so a
// reader never sees a half-written JSON file.
//
// The recorder replaces the file extension of the path it is
// given, so checkpoint file stems must not contain dots.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Record, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::domain::error::NecstError;
use crate::ml::model::NecstModelConfig;

type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

const LATEST_FILE:       &str = "latest.json";
const BEST_FILE:         &str = "best.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";

/// Lowest validation loss seen so far, and where it was saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRecord {
    pub id:         String,
    /// Metadata path; stays valid when a resumed run writes elsewhere
    pub path:       PathBuf,
    pub epoch:      usize,
    pub step:       usize,
    pub valid_loss: f64,
}

/// Progress stored alongside each checkpoint's weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub id:         String,
    /// Epoch the checkpoint was taken in
    pub epoch:      usize,
    /// Batches of `epoch` already consumed
    pub next_batch: usize,
    /// Global optimisation steps taken
    pub step:       usize,
    #[serde(deserialize_with = "nan_if_null")]
    pub train_loss: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub valid_loss: f64,
    /// Best checkpoint as of this one, carried across resumes
    pub best:       Option<BestRecord>,
}

/// serde_json writes non-finite floats as null
fn nan_if_null<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
}

/// One checkpoint on disk: its directory plus its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHandle {
    pub dir: PathBuf,
    pub id:  String,
}

impl CheckpointHandle {
    pub fn meta_path(&self) -> PathBuf { self.dir.join(format!("{}.json", self.id)) }

    fn model_path(&self) -> PathBuf { self.dir.join(format!("{}-model", self.id)) }

    fn optim_path(&self) -> PathBuf { self.dir.join(format!("{}-optim", self.id)) }

    pub fn exists(&self) -> bool { self.meta_path().is_file() }
}

impl fmt::Display for CheckpointHandle {
    /// The metadata path: what `--ckpt` accepts back
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.meta_path().display())
    }
}

pub fn checkpoint_id(step: usize) -> String {
    format!("ckpt-{step:08}")
}

fn checkpoint_error(path: &Path, message: impl Into<String>) -> NecstError {
    NecstError::Checkpoint { path: path.to_path_buf(), message: message.into() }
}

/// Write JSON through a temp file and rename it into place
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp  = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, json).map_err(|e| NecstError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| NecstError::io(path, e))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|e| NecstError::io(path, e))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

/// Checkpoints of one run, all inside `dir`
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| NecstError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn handle(&self, id: impl Into<String>) -> CheckpointHandle {
        CheckpointHandle { dir: self.dir.clone(), id: id.into() }
    }

    /// Turn a `--ckpt` value into a handle.
    ///
    /// Accepted forms:
    ///   ckpt-00000500                          id in this run's directory
    ///   some/dir/ckpt-00000500(.json)          checkpoint of any run
    pub fn resolve(&self, reference: &str) -> Result<CheckpointHandle> {
        let path = Path::new(reference.trim());
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.strip_suffix(".json").unwrap_or(n).to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| NecstError::config(format!("invalid checkpoint reference '{reference}'")))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => self.dir.clone(),
        };

        let handle = CheckpointHandle { dir, id };
        if !handle.exists() {
            return Err(checkpoint_error(&handle.meta_path(), "no checkpoint metadata at this path").into());
        }
        Ok(handle)
    }

    /// Save model and optimiser state, then publish the metadata.
    pub fn save<B: Backend, M: Module<B>, R: Record<B>>(
        &self,
        model: &M,
        optim: R,
        meta:  &CheckpointMeta,
    ) -> Result<CheckpointHandle> {
        let handle   = self.handle(meta.id.clone());
        let recorder = CheckpointRecorder::new();

        let path = handle.model_path();
        <CheckpointRecorder as Recorder<B>>::record(&recorder, model.clone().into_record(), path.clone())
            .map_err(|e| checkpoint_error(&path, format!("{e:?}")))?;

        let path = handle.optim_path();
        <CheckpointRecorder as Recorder<B>>::record(&recorder, optim, path.clone())
            .map_err(|e| checkpoint_error(&path, format!("{e:?}")))?;

        write_json_atomic(&handle.meta_path(), meta)?;
        write_json_atomic(&self.dir.join(LATEST_FILE), &meta.id)?;

        tracing::debug!("Saved checkpoint {}", handle);
        Ok(handle)
    }

    /// Restore weights into a freshly initialised model of the same architecture
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        handle: &CheckpointHandle,
        model:  M,
        device: &B::Device,
    ) -> Result<M> {
        let path   = handle.model_path();
        let record = <CheckpointRecorder as Recorder<B>>::load::<M::Record>(&CheckpointRecorder::new(), path.clone(), device)
            .map_err(|e| checkpoint_error(&path, format!("{e:?}")))?;
        Ok(model.load_record(record))
    }

    pub fn load_optimizer<B: Backend, R: Record<B>>(
        &self,
        handle: &CheckpointHandle,
        device: &B::Device,
    ) -> Result<R> {
        let path = handle.optim_path();
        let record = <CheckpointRecorder as Recorder<B>>::load::<R>(&CheckpointRecorder::new(), path.clone(), device)
            .map_err(|e| checkpoint_error(&path, format!("{e:?}")))?;
        Ok(record)
    }

    pub fn read_meta(&self, handle: &CheckpointHandle) -> Result<CheckpointMeta> {
        read_json(&handle.meta_path())
    }

    /// Newest checkpoint of this run, if any was published
    pub fn latest(&self) -> Result<Option<CheckpointHandle>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let id: String = read_json(&path)?;
        Ok(Some(self.handle(id)).filter(CheckpointHandle::exists))
    }

    pub fn best(&self) -> Result<Option<BestRecord>> {
        let path = self.dir.join(BEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn record_best(&self, best: &BestRecord) -> Result<()> {
        write_json_atomic(&self.dir.join(BEST_FILE), best)
    }

    /// Must be written before the first checkpoint so analysis can
    /// rebuild the exact architecture.
    pub fn save_model_config(&self, cfg: &NecstModelConfig) -> Result<()> {
        write_json_atomic(&self.dir.join(MODEL_CONFIG_FILE), cfg)
    }

    /// Architecture stored next to `handle`
    pub fn load_model_config(&self, handle: &CheckpointHandle) -> Result<NecstModelConfig> {
        let path = handle.dir.join(MODEL_CONFIG_FILE);
        read_json(&path).with_context(|| {
            format!("Cannot rebuild the model for {handle}: '{}' is missing or invalid", path.display())
        })
    }
}

//! Checkpointing
//!
//! Persists training progress as a pair of files per tag: the model weights
//! through Burn's CompactRecorder and a JSON `TrainingState` with the
//! epoch/step counters and best validation score. A checkpoint is flushed at
//! every epoch boundary, so an interrupted run resumes from the last
//! completed epoch.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::{Result, ShipSegError};

/// Counters and scores carried across restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingState {
    /// Next epoch to run (completed epochs count).
    pub epoch: usize,
    /// Optimizer steps taken so far.
    pub step: usize,
    /// Best validation dice seen so far.
    pub best_dice: f64,
    pub timestamp: String,
}

impl TrainingState {
    pub fn new(epoch: usize, step: usize, best_dice: f64) -> Self {
        Self {
            epoch,
            step,
            best_dice,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Saves and restores checkpoints under one output directory.
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn weights_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("model_{}", tag))
    }

    fn state_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("state_{}.json", tag))
    }

    /// Whether a resumable checkpoint exists.
    pub fn has_latest(&self) -> bool {
        self.state_path("latest").exists()
    }

    /// Save weights and state under `latest`, and under `best` as well when
    /// this epoch improved the validation score.
    pub fn save<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        state: &TrainingState,
        is_best: bool,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.save_tagged(model, state, "latest")?;
        if is_best {
            self.save_tagged(model, state, "best")?;
            info!("New best checkpoint (dice {:.4})", state.best_dice);
        }
        Ok(())
    }

    fn save_tagged<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        state: &TrainingState,
        tag: &str,
    ) -> Result<()> {
        model
            .clone()
            .save_file(self.weights_path(tag), &CompactRecorder::new())
            .map_err(|e| ShipSegError::Model(format!("failed to save weights: {:?}", e)))?;

        let json = serde_json::to_string_pretty(state)?;
        fs::write(self.state_path(tag), json)?;
        Ok(())
    }

    /// Load the latest training state, or None when starting fresh.
    pub fn load_latest_state(&self) -> Result<Option<TrainingState>> {
        let path = self.state_path("latest");
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Load weights for the given tag into a freshly initialized model.
    pub fn load_weights<B: Backend, M: Module<B>>(
        &self,
        model: M,
        tag: &str,
        device: &B::Device,
    ) -> Result<M> {
        model
            .load_file(self.weights_path(tag), &CompactRecorder::new(), device)
            .map_err(|e| ShipSegError::Model(format!("failed to load weights: {:?}", e)))
    }
}

/// Load weights from an explicit file path (as saved by a checkpointer or
/// exported elsewhere).
pub fn load_model_file<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<M> {
    model
        .load_file(path.to_path_buf(), &CompactRecorder::new(), device)
        .map_err(|e| ShipSegError::Model(format!("failed to load {}: {:?}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::unet::{Unet, UnetConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());

        assert!(!checkpointer.has_latest());
        assert!(checkpointer.load_latest_state().unwrap().is_none());

        let device = Default::default();
        let config = UnetConfig::new().with_base_filters(2);
        let model = Unet::<TestBackend>::new(&config, &device);

        let state = TrainingState::new(3, 120, 0.71);
        checkpointer.save(&model, &state, false).unwrap();

        assert!(checkpointer.has_latest());
        let loaded = checkpointer.load_latest_state().unwrap().unwrap();
        assert_eq!(loaded.epoch, 3);
        assert_eq!(loaded.step, 120);
        assert!((loaded.best_dice - 0.71).abs() < 1e-12);
    }

    #[test]
    fn test_best_tag_written_on_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path());

        let device = Default::default();
        let config = UnetConfig::new().with_base_filters(2);
        let model = Unet::<TestBackend>::new(&config, &device);

        checkpointer
            .save(&model, &TrainingState::new(1, 10, 0.5), true)
            .unwrap();
        assert!(dir.path().join("state_best.json").exists());

        // Weights restore into a fresh model of the same shape.
        let fresh = Unet::<TestBackend>::new(&config, &device);
        let restored = checkpointer.load_weights(fresh, "best", &device);
        assert!(restored.is_ok());
    }
}

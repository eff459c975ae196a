//! Training Loop
//!
//! A manual epoch loop over Burn's API: shuffled indices per epoch, lazy
//! batching, Adam updates, validation with Dice/Jaccard after every epoch,
//! a JSON-lines event log, and a checkpoint flushed at each epoch boundary
//! so interrupted runs resume from the last completed epoch.

use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    tensor::{
        activation::sigmoid,
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use tracing::info;

use crate::dataset::burn_dataset::{ShipBatch, ShipBatcher, ShipDataset, ShipItem};
use crate::dataset::records::{group_by_image, read_records, ImageGroups};
use crate::dataset::split::{DatasetSplits, SplitConfig};
use crate::dataset::transform::{train_transforms, validation_transforms};
use crate::model::unet::Unet;
use crate::training::checkpoint::{load_model_file, Checkpointer, TrainingState};
use crate::training::loss::SegmentationLoss;
use crate::training::TrainerConfig;
use crate::utils::error::{Result, ShipSegError};
use crate::utils::metrics::{MetricsSummary, SegmentationMetrics};
use crate::PREDICTION_THRESHOLD;

/// Log an event every this many optimizer steps.
const REPORT_EACH: usize = 50;

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub final_loss: f64,
    pub best_dice: f64,
    pub validation: MetricsSummary,
}

/// JSON-lines event log, one object per line.
struct TrainLog {
    writer: BufWriter<File>,
}

impl TrainLog {
    fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn write_event(&mut self, mut event: serde_json::Value) -> Result<()> {
        event["dt"] = json!(chrono::Local::now().to_rfc3339());
        writeln!(self.writer, "{}", event)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn load_groups(config: &TrainerConfig) -> Result<(ImageGroups, DatasetSplits)> {
    let records = read_records(&config.csv_path)?;
    let groups = group_by_image(&records);
    let splits = DatasetSplits::from_groups(
        &groups,
        &SplitConfig {
            validation_fraction: config.validation_fraction,
            seed: config.seed,
            drop_empty_images: true,
        },
    )?;
    let stats = splits.stats();
    info!(
        "Split {} images into {} train / {} validation",
        groups.len(),
        stats.train_size,
        stats.validation_size
    );
    Ok((groups, splits))
}

/// Run training with the given configuration, resuming from the latest
/// checkpoint in the output directory when one exists.
pub fn run_training<B: AutodiffBackend>(config: &TrainerConfig) -> Result<TrainingReport> {
    let device = B::Device::default();
    fs::create_dir_all(&config.output_dir)?;

    let (groups, splits) = load_groups(config)?;

    let train_dataset = ShipDataset::new(
        &config.images_dir,
        &groups,
        &splits.train_ids,
        train_transforms(config.crop_size),
        config.seed,
    );
    let val_dataset = ShipDataset::new(
        &config.images_dir,
        &groups,
        &splits.validation_ids,
        validation_transforms(config.valid_crop_size),
        config.seed,
    );

    let batcher = ShipBatcher::new();
    let loss_fn = SegmentationLoss::new(config.loss);
    let checkpointer = Checkpointer::new(&config.output_dir);

    let mut model = Unet::<B>::new(&config.model.config(), &device);
    let mut start_epoch = 0usize;
    let mut step = 0usize;
    let mut best_dice = 0.0f64;

    if let Some(state) = checkpointer.load_latest_state()? {
        model = checkpointer.load_weights(model, "latest", &device)?;
        start_epoch = state.epoch;
        step = state.step;
        best_dice = state.best_dice;
        info!("Restored checkpoint: epoch {}, step {}", start_epoch, step);
    }

    let mut optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(1e-4)))
        .init();

    let mut log = TrainLog::create(&config.output_dir.join("train.log"))?;
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut final_loss = 0.0f64;
    let mut last_summary = MetricsSummary {
        dice: 0.0,
        jaccard: 0.0,
        batches: 0,
    };

    for epoch in start_epoch..config.epochs {
        info!("Epoch {}/{} started", epoch + 1, config.epochs);

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);
        let num_batches = (indices.len() + config.batch_size - 1) / config.batch_size;

        let mut epoch_loss = 0.0f64;
        let mut batches_run = 0usize;

        for chunk in indices.chunks(config.batch_size) {
            let items: Vec<ShipItem> = chunk.iter().filter_map(|&i| train_dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: ShipBatch<B> = batcher.batch(items, &device);
            let logits = model.forward(batch.images);
            let loss = loss_fn.forward(logits, batch.masks);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            epoch_loss += loss_value;
            batches_run += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
            step += 1;

            if step % REPORT_EACH == 0 {
                let running = epoch_loss / batches_run as f64;
                log.write_event(json!({ "step": step, "loss": running }))?;
            }
        }

        let avg_loss = epoch_loss / num_batches.max(1) as f64;
        final_loss = avg_loss;

        let inner_device = <B::InnerBackend as Backend>::Device::default();
        let inner_model = model.valid();
        let (val_loss, summary) = validate_model(
            &inner_model,
            &val_dataset,
            &batcher,
            &loss_fn,
            config.valid_batch_size,
            &inner_device,
        )?;
        last_summary = summary;

        info!(
            "Epoch {}/{} | loss {:.5} | valid loss {:.5} | dice {:.5} | jaccard {:.5}",
            epoch + 1,
            config.epochs,
            avg_loss,
            val_loss,
            summary.dice,
            summary.jaccard
        );
        log.write_event(json!({
            "step": step,
            "loss": avg_loss,
            "valid_loss": val_loss,
            "dice": summary.dice,
            "jaccard": summary.jaccard,
        }))?;

        let is_best = summary.dice > best_dice;
        if is_best {
            best_dice = summary.dice;
        }
        checkpointer.save(&model, &TrainingState::new(epoch + 1, step, best_dice), is_best)?;
    }

    Ok(TrainingReport {
        epochs_run: config.epochs.saturating_sub(start_epoch),
        final_loss,
        best_dice,
        validation: last_summary,
    })
}

/// Evaluate model weights on the validation split of the configured dataset.
pub fn run_evaluation<B: Backend>(
    config: &TrainerConfig,
    weights_path: &Path,
) -> Result<(f64, MetricsSummary)> {
    let device = B::Device::default();
    let (groups, splits) = load_groups(config)?;

    let val_dataset = ShipDataset::new(
        &config.images_dir,
        &groups,
        &splits.validation_ids,
        validation_transforms(config.valid_crop_size),
        config.seed,
    );

    let model = Unet::<B>::new(&config.model.config(), &device);
    let model = load_model_file(model, weights_path, &device)?;

    let batcher = ShipBatcher::new();
    let loss_fn = SegmentationLoss::new(config.loss);
    validate_model(
        &model,
        &val_dataset,
        &batcher,
        &loss_fn,
        config.valid_batch_size,
        &device,
    )
}

/// Run the validation set through a model, collecting loss and overlap
/// metrics.
fn validate_model<B: Backend>(
    model: &Unet<B>,
    dataset: &ShipDataset,
    batcher: &ShipBatcher,
    loss_fn: &SegmentationLoss,
    batch_size: usize,
    device: &B::Device,
) -> Result<(f64, MetricsSummary)> {
    let mut metrics = SegmentationMetrics::new(PREDICTION_THRESHOLD);
    let mut loss_sum = 0.0f64;
    let mut batches = 0usize;

    for start in (0..dataset.len()).step_by(batch_size.max(1)) {
        let end = (start + batch_size).min(dataset.len());
        let items: Vec<ShipItem> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch: ShipBatch<B> = batcher.batch(items, device);
        let logits = model.forward(batch.images);
        let loss = loss_fn.forward(logits.clone(), batch.masks.clone());
        loss_sum += loss.into_scalar().elem::<f64>();
        batches += 1;

        let probs: Vec<f32> = sigmoid(logits)
            .into_data()
            .to_vec()
            .map_err(|e| ShipSegError::Training(format!("failed to read predictions: {:?}", e)))?;
        let targets: Vec<f32> = batch
            .masks
            .into_data()
            .to_vec()
            .map_err(|e| ShipSegError::Training(format!("failed to read targets: {:?}", e)))?;
        metrics.collect(&probs, &targets);
    }

    let avg_loss = loss_sum / batches.max(1) as f64;
    Ok((avg_loss, metrics.get()))
}

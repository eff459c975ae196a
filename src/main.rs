//! Ship Segmentation CLI
//!
//! Entry point for dataset statistics, training, validation evaluation, and
//! submission generation.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use shipseg::backend::{backend_name, DefaultBackend, TrainingBackend};
use shipseg::dataset::mask::{image_pixel_count, pixel_distribution};
use shipseg::dataset::records::{group_by_image, read_records};
use shipseg::inference::submission::run_prediction;
use shipseg::training::{run_evaluation, run_training};
use shipseg::utils::logging::{init_logging, LogConfig};
use shipseg::{LossKind, ModelKind, PredictConfig, TrainerConfig, MASK_SIZE};

fn parse_model(s: &str) -> Result<ModelKind, String> {
    s.parse().map_err(|e: shipseg::ShipSegError| e.to_string())
}

fn parse_loss(s: &str) -> Result<LossKind, String> {
    s.parse().map_err(|e: shipseg::ShipSegError| e.to_string())
}

/// Ship segmentation on satellite imagery with Burn
#[derive(Parser, Debug)]
#[command(name = "shipseg")]
#[command(version)]
#[command(about = "Ship detection and segmentation with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show dataset statistics from the mask CSV
    Stats {
        /// Path to the mask records CSV
        #[arg(short, long, default_value = "data/train_ship_segmentations_v2.csv")]
        csv: PathBuf,
    },

    /// Train the segmentation model
    Train {
        /// Path to the mask records CSV
        #[arg(long, default_value = "data/train_ship_segmentations_v2.csv")]
        csv: PathBuf,

        /// Directory of training images
        #[arg(long, default_value = "data/train_v2")]
        images_dir: PathBuf,

        /// Directory for checkpoints and the training log
        #[arg(short, long, default_value = "results")]
        output_dir: PathBuf,

        /// Architecture variant (unet | unet-lite)
        #[arg(long, default_value = "unet", value_parser = parse_model)]
        model: ModelKind,

        /// Loss variant (bce | focal | bce-dice | bce-jaccard)
        #[arg(long, default_value = "bce", value_parser = parse_loss)]
        loss: LossKind,

        /// Number of training epochs
        #[arg(short, long, default_value = "3")]
        epochs: usize,

        /// Training batch size
        #[arg(short, long, default_value = "16")]
        batch_size: usize,

        /// Validation batch size
        #[arg(long, default_value = "4")]
        valid_batch_size: usize,

        /// Learning rate
        #[arg(short, long, default_value = "0.0001")]
        learning_rate: f64,

        /// Random crop size for training samples
        #[arg(long, default_value = "256")]
        crop: usize,

        /// Center crop size for validation samples
        #[arg(long, default_value = "512")]
        valid_crop: usize,

        /// Fraction of images held out for validation
        #[arg(long, default_value = "0.05")]
        validation_fraction: f64,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Evaluate trained weights on the validation split
    Evaluate {
        /// Trained weights file (without recorder extension)
        #[arg(short, long)]
        weights: PathBuf,

        /// Path to the mask records CSV
        #[arg(long, default_value = "data/train_ship_segmentations_v2.csv")]
        csv: PathBuf,

        /// Directory of training images
        #[arg(long, default_value = "data/train_v2")]
        images_dir: PathBuf,

        /// Architecture the weights were trained with
        #[arg(long, default_value = "unet", value_parser = parse_model)]
        model: ModelKind,

        /// Loss to report alongside the overlap metrics
        #[arg(long, default_value = "bce", value_parser = parse_loss)]
        loss: LossKind,

        /// Center crop size for validation samples
        #[arg(long, default_value = "512")]
        valid_crop: usize,

        /// Fraction of images held out for validation
        #[arg(long, default_value = "0.05")]
        validation_fraction: f64,

        /// Random seed; must match the training run to get the same split
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Predict test images and write the submission CSV
    Predict {
        /// Trained weights file (without recorder extension)
        #[arg(short, long)]
        weights: PathBuf,

        /// Directory of test images
        #[arg(long, default_value = "data/test_v2")]
        images_dir: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "submission.csv")]
        output: PathBuf,

        /// Architecture the weights were trained with
        #[arg(long, default_value = "unet", value_parser = parse_model)]
        model: ModelKind,

        /// Inference batch size
        #[arg(short, long, default_value = "2")]
        batch_size: usize,

        /// Probability threshold
        #[arg(long, default_value = "0.5")]
        threshold: f32,

        /// Disk radius of the opening pre-filter
        #[arg(long, default_value = "2")]
        opening_radius: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Stats { csv } => cmd_stats(&csv)?,

        Commands::Train {
            csv,
            images_dir,
            output_dir,
            model,
            loss,
            epochs,
            batch_size,
            valid_batch_size,
            learning_rate,
            crop,
            valid_crop,
            validation_fraction,
            seed,
        } => {
            let config = TrainerConfig {
                csv_path: csv,
                images_dir,
                output_dir,
                model,
                loss,
                epochs,
                batch_size,
                valid_batch_size,
                learning_rate,
                crop_size: crop,
                valid_crop_size: valid_crop,
                validation_fraction,
                seed,
            };
            cmd_train(&config)?;
        }

        Commands::Evaluate {
            weights,
            csv,
            images_dir,
            model,
            loss,
            valid_crop,
            validation_fraction,
            seed,
        } => {
            let config = TrainerConfig {
                csv_path: csv,
                images_dir,
                model,
                loss,
                valid_crop_size: valid_crop,
                validation_fraction,
                seed,
                ..TrainerConfig::default()
            };
            cmd_evaluate(&config, &weights)?;
        }

        Commands::Predict {
            weights,
            images_dir,
            output,
            model,
            batch_size,
            threshold,
            opening_radius,
        } => {
            let config = PredictConfig {
                weights_path: weights,
                images_dir,
                output_path: output,
                model,
                batch_size,
                threshold,
                opening_radius,
            };
            cmd_predict(&config)?;
        }
    }

    Ok(())
}

fn cmd_stats(csv: &std::path::Path) -> Result<()> {
    info!("Computing dataset statistics for: {}", csv.display());

    let records = read_records(csv)?;
    let groups = group_by_image(&records);

    let with_ships = groups
        .image_ids()
        .iter()
        .filter(|id| groups.ship_count(id) > 0)
        .count();
    let without_ships = groups.len() - with_ships;

    println!("{}", "Dataset Statistics:".cyan().bold());
    println!("  Records:              {}", records.len());
    println!("  Images:               {}", groups.len());
    println!("  Images with ships:    {}", with_ships);
    println!("  Images without ships: {}", without_ships);

    let dist = pixel_distribution(&records, (MASK_SIZE, MASK_SIZE))?;
    println!();
    println!("{}", "Pixel Distribution:".cyan().bold());
    println!(
        "  Ship:    {:.3} ({})",
        dist.ship_ratio(),
        dist.ship_pixels
    );
    println!(
        "  No ship: {:.3} ({})",
        1.0 - dist.ship_ratio(),
        dist.total_pixels - dist.ship_pixels
    );

    // Ship-count histogram over images that have ships.
    let max_count = groups
        .image_ids()
        .iter()
        .map(|id| groups.ship_count(id))
        .max()
        .unwrap_or(0);
    if max_count > 0 {
        println!();
        println!("{}", "Ships per image:".cyan().bold());
        for count in 1..=max_count {
            let images = groups
                .image_ids()
                .iter()
                .filter(|id| groups.ship_count(id) == count)
                .count();
            if images > 0 {
                println!("  {:3} ships: {:6} images", count, images);
            }
        }

        let mut largest_px = 0u64;
        let mut largest_id = "";
        for (id, masks) in groups.iter() {
            let px = image_pixel_count(masks)?;
            if px > largest_px {
                largest_px = px;
                largest_id = id;
            }
        }
        println!();
        println!("  Largest ship area: {} px ({})", largest_px, largest_id);
    }

    Ok(())
}

fn cmd_train(config: &TrainerConfig) -> Result<()> {
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  CSV:         {}", config.csv_path.display());
    println!("  Images:      {}", config.images_dir.display());
    println!("  Output:      {}", config.output_dir.display());
    println!("  Model:       {}", config.model);
    println!("  Loss:        {}", config.loss);
    println!("  Epochs:      {}", config.epochs);
    println!("  Batch size:  {}", config.batch_size);
    println!("  LR:          {}", config.learning_rate);
    println!("  Crop:        {} (train) / {} (valid)", config.crop_size, config.valid_crop_size);
    println!("  Backend:     {}", backend_name());
    println!();

    println!("{}", "Starting Training...".green().bold());
    let report = run_training::<TrainingBackend>(config)?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Final loss: {:.5}", report.final_loss);
    println!("  Best dice:  {:.5}", report.best_dice);
    println!(
        "  Validation: dice {:.5} | jaccard {:.5}",
        report.validation.dice, report.validation.jaccard
    );
    println!();
    println!("{}", "Next steps:".cyan().bold());
    println!(
        "  shipseg predict --weights {}/model_best",
        config.output_dir.display()
    );

    Ok(())
}

fn cmd_evaluate(config: &TrainerConfig, weights: &std::path::Path) -> Result<()> {
    println!("{}", "Evaluation Configuration:".cyan().bold());
    println!("  Weights: {}", weights.display());
    println!("  Model:   {}", config.model);
    println!("  Backend: {}", backend_name());
    println!();

    let (loss, summary) = run_evaluation::<DefaultBackend>(config, weights)?;

    println!("{}", "Validation Results:".green().bold());
    println!("  Loss:    {:.5}", loss);
    println!("  Dice:    {:.5}", summary.dice);
    println!("  Jaccard: {:.5}", summary.jaccard);
    println!("  Batches: {}", summary.batches);

    Ok(())
}

fn cmd_predict(config: &PredictConfig) -> Result<()> {
    println!("{}", "Prediction Configuration:".cyan().bold());
    println!("  Weights:   {}", config.weights_path.display());
    println!("  Images:    {}", config.images_dir.display());
    println!("  Output:    {}", config.output_path.display());
    println!("  Model:     {}", config.model);
    println!("  Threshold: {}", config.threshold);
    println!("  Backend:   {}", backend_name());
    println!();

    let rows = run_prediction::<DefaultBackend>(config)?;

    println!();
    println!("{}", "Submission Complete!".green().bold());
    println!("  {} rows written to {}", rows, config.output_path.display());

    Ok(())
}

use std::path::PathBuf;

use clap::{Args as ArgsTrait, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Trains a model on the CIFAR-10 binary batches.
    Train(TrainConfig),
    /// Evaluates a saved model against the test batch.
    Evaluate(EvaluateConfig),
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct TrainConfig {
    /// The directory containing data_batch_{1..5}.bin and test_batch.bin.
    #[arg(short, long, default_value = "cifar-10-batches-bin")]
    pub data: PathBuf,

    /// The directory to write models, checkpoints, and the loss history into.
    #[arg(short, long, default_value = "training")]
    pub output: PathBuf,

    /// A checkpoint file to resume from. Hyperparameter flags are ignored in
    /// favor of the checkpoint's.
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// The model architecture to train.
    #[arg(long, value_enum, default_value = "cnn")]
    pub model: Model,

    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f32,

    #[arg(long, default_value_t = 100)]
    pub max_epochs: usize,

    #[arg(long, default_value_t = 25)]
    pub batch_size: usize,

    /// Stop early once the epoch-to-epoch change in training loss falls
    /// below this.
    #[arg(long, default_value_t = 1.0e-9)]
    pub min_loss_delta: f32,

    #[arg(long, default_value_t = 0.0)]
    pub l2_reg: f32,

    /// The fraction of the training set to hold out for validation.
    #[arg(long, default_value_t = 0.1, value_parser = parse_validation_split)]
    pub validation_split: f32,
}

fn parse_validation_split(value: &str) -> Result<f32, String> {
    let fraction = value.parse::<f32>().map_err(|err| err.to_string())?;
    if fraction > 0.0 && fraction < 1.0 {
        Ok(fraction)
    } else {
        Err("must be strictly between 0 and 1".into())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Model {
    Cnn,
    Mlp,
}

#[derive(ArgsTrait, Clone, Debug)]
pub struct EvaluateConfig {
    /// A model file produced by `train`.
    pub model: PathBuf,

    /// The directory containing test_batch.bin.
    #[arg(short, long, default_value = "cifar-10-batches-bin")]
    pub data: PathBuf,
}

use std::env;
use std::fs::{self, File};
use std::path::Path;

use clap::Parser;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format;

use nn::layers::{ActivationLayer, Conv2d, Dropout, Flatten, FullyConnected, Initializer};
use nn::loss::Objective;
use nn::score::{decode, element_accuracy, label_accuracy};
use nn::train::{Trainer, TrainerConfig};
use nn::{Activation, Descent, Mode, Network};

use self::args::{Args, Command, EvaluateConfig, Model, TrainConfig};

mod args;
mod data;

const MODEL_DIR: &str = "models";
const CHECKPOINT_DIR: &str = "checkpoints";

fn main() {
    set_default_logging();

    let event_format = format().with_target(false).without_time();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(event_format)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Train(config) => run_training(config),
        Command::Evaluate(config) => run_evaluation(config),
    }
}

fn set_default_logging() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
}

/// Trainer state alongside the model, so a run can pick up where it left off.
#[derive(Deserialize, Serialize)]
struct Checkpoint {
    network: Network,
    trainer: Trainer,
}

fn run_training(config: TrainConfig) {
    fs::create_dir_all(config.output.join(MODEL_DIR))
        .expect("could not create model directory");
    fs::create_dir_all(config.output.join(CHECKPOINT_DIR))
        .expect("could not create checkpoint directory");

    let mut rng = rand::thread_rng();

    let training = data::load_training_data(&config.data).expect("could not read training batches");
    let test = data::load_test_data(&config.data).expect("could not read test batch");

    let (training, validation) = data::split(training, config.validation_split);

    info!(
        training = training.len(),
        validation = validation.len(),
        test = test.len(),
        "Loaded dataset:",
    );

    let (mut network, mut trainer) = if let Some(path) = &config.resume {
        let file = File::open(path).expect("could not read checkpoint file");
        let checkpoint: Checkpoint =
            serde_json::from_reader(file).expect("could not parse checkpoint file");

        info!(epoch = checkpoint.trainer.epoch(), "Resuming from checkpoint.");
        (checkpoint.network, checkpoint.trainer)
    } else {
        (
            build_network(config.model, &mut rng),
            Trainer::new(trainer_config(&config)),
        )
    };

    let checkpoint_path = config.output.join(format!("{CHECKPOINT_DIR}/latest.json"));
    let history = trainer.train_with_checkpoints(
        &mut network,
        &training.samples(),
        &validation.samples(),
        &test.samples(),
        &mut rng,
        // An interrupted run resumes from the last completed epoch.
        |network, trainer| {
            save_json(
                &Checkpoint {
                    network: network.clone(),
                    trainer: trainer.clone(),
                },
                &checkpoint_path,
            );
        },
    );

    let epoch = trainer.epoch();
    save_json(
        &network,
        config.output.join(format!("{MODEL_DIR}/model_{epoch:03}.json")),
    );
    save_json(&network, config.output.join(format!("{MODEL_DIR}/latest.json")));
    save_json(&Checkpoint { network, trainer }, &checkpoint_path);

    // The loss curves are left for external plotting.
    save_json(&history, config.output.join("history.json"));
}

fn run_evaluation(config: EvaluateConfig) {
    let file = File::open(&config.model).expect("could not read model file");
    let mut network: Network = serde_json::from_reader(file).expect("could not parse model file");

    let test = data::load_test_data(&config.data).expect("could not read test batch");
    let samples = test.samples();

    let loss = network.evaluate(&samples.inputs, &samples.labels);
    let outputs = network.forward(&samples.inputs, Mode::Infer);
    let element = element_accuracy(&samples.labels, &outputs, 0.5);
    let label = label_accuracy(&test.labels, &decode(&outputs));

    info!(
        loss = %format!("{loss:.6}"),
        element = %format!("{:.2}%", element * 100.0),
        label = %format!("{:.2}%", label * 100.0),
        "Test set:",
    );
}

fn trainer_config(config: &TrainConfig) -> TrainerConfig {
    TrainerConfig {
        learning_rate: config.learning_rate,
        max_epochs: config.max_epochs,
        batch_size: config.batch_size,
        min_loss_delta: config.min_loss_delta,
        l2_reg: config.l2_reg,
        // Only the MLP's first layer (the flatten) has nothing to learn.
        skip_first_layer: config.model == Model::Mlp,
    }
}

fn build_network(model: Model, rng: &mut impl Rng) -> Network {
    let pixels = data::IMAGE_SIZE * data::IMAGE_SIZE;

    let layers = match model {
        Model::Cnn => vec![
            Conv2d::random(3, 1, 8, 1, Initializer::HeNormal, Descent::adam(), rng).into(),
            ActivationLayer::new(Activation::Relu).into(),
            Flatten::new().into(),
            FullyConnected::random(pixels * 8, 64, Initializer::HeNormal, Descent::adam(), rng)
                .into(),
            ActivationLayer::new(Activation::Relu).into(),
            Dropout::new(0.5).into(),
            FullyConnected::random(64, data::CLASSES, Initializer::GlorotUniform, Descent::adam(), rng)
                .into(),
            ActivationLayer::new(Activation::Sigmoid).into(),
        ],
        Model::Mlp => vec![
            Flatten::new().into(),
            FullyConnected::random(pixels, 128, Initializer::HeNormal, Descent::adam(), rng)
                .into(),
            ActivationLayer::new(Activation::Relu).into(),
            Dropout::new(0.5).into(),
            FullyConnected::random(128, data::CLASSES, Initializer::GlorotUniform, Descent::adam(), rng)
                .into(),
            ActivationLayer::new(Activation::Sigmoid).into(),
        ],
    };

    Network::new(layers, Objective::CrossEntropy)
}

fn save_json(value: &impl Serialize, path: impl AsRef<Path>) {
    let file = File::create(path).expect("could not create output file");
    serde_json::to_writer(file, value).expect("could not write output file");
}

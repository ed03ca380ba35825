use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::network::{Mode, Network};
use crate::score::element_accuracy;
use crate::tensor::Tensor;

/// The binarization threshold for element-wise accuracy reporting.
const ACCURACY_THRESHOLD: f32 = 0.5;

/// An input batch paired with its one-hot labels.
#[derive(Clone, Debug)]
pub struct Samples {
    pub inputs: Tensor,
    pub labels: Tensor,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TrainerConfig {
    pub learning_rate: f32,
    pub max_epochs: usize,
    pub batch_size: usize,
    /// Training stops early once the epoch-to-epoch change in training loss
    /// falls below this.
    pub min_loss_delta: f32,
    pub l2_reg: f32,
    /// Leave the first layer out of the backward sweep; it receives neither
    /// input gradients nor parameter updates.
    pub skip_first_layer: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            max_epochs: 100,
            batch_size: 25,
            min_loss_delta: 1.0e-9,
            l2_reg: 0.0,
            skip_first_layer: true,
        }
    }
}

/// Per-epoch loss curves and the final accuracy report.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct History {
    pub training_loss: Vec<f32>,
    pub validation_loss: Vec<f32>,
    pub report: Report,
}

/// Element accuracy on each split after training.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct Report {
    pub training: f32,
    pub validation: f32,
    pub testing: f32,
}

/// Drives a network through epochs of shuffled minibatch gradient descent.
///
/// The trainer itself is serializable so that a checkpoint can resume with
/// the epoch and step counters intact (the step feeds Adam's bias
/// correction) and with the last training loss, which the convergence check
/// compares against.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Trainer {
    pub config: TrainerConfig,
    epoch: usize,
    step: usize,
    last_loss: f32,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            epoch: 0,
            step: 0,
            last_loss: 0.0,
        }
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Trains until `max_epochs` or convergence, then scores all three
    /// splits.
    pub fn train(
        &mut self,
        network: &mut Network,
        training: &Samples,
        validation: &Samples,
        test: &Samples,
        rng: &mut impl Rng,
    ) -> History {
        self.train_with_checkpoints(network, training, validation, test, rng, |_, _| {})
    }

    /// Like [`train`](Self::train), but calls `checkpoint` with the network
    /// and trainer state after every completed epoch so that an interrupted
    /// run has something to resume from.
    pub fn train_with_checkpoints(
        &mut self,
        network: &mut Network,
        training: &Samples,
        validation: &Samples,
        test: &Samples,
        rng: &mut impl Rng,
        mut checkpoint: impl FnMut(&Network, &Trainer),
    ) -> History {
        let mut history = History::default();

        let mut indices = (0..training.inputs.rows()).collect::<Vec<_>>();

        while self.epoch < self.config.max_epochs {
            indices.shuffle(rng);
            let inputs = training.inputs.gather_rows(&indices);
            let labels = training.labels.gather_rows(&indices);

            // The final batch may come up short of batch_size.
            let rows = inputs.rows();
            let mut start = 0;
            while start < rows {
                let end = (start + self.config.batch_size).min(rows);

                self.step += 1;
                network.train_batch(
                    self.step,
                    &inputs.slice_rows(start..end),
                    &labels.slice_rows(start..end),
                    self.config.learning_rate,
                    self.config.l2_reg,
                    self.config.skip_first_layer,
                );

                start = end;
            }

            let training_loss = network.evaluate(&training.inputs, &training.labels);
            history.training_loss.push(training_loss);

            // Finish training if the change in loss is too small.
            if self.epoch > 2
                && (training_loss - self.last_loss).abs() < self.config.min_loss_delta
            {
                info!(epoch = self.epoch, "Training loss converged. Stopping.");
                break;
            }
            self.last_loss = training_loss;

            let validation_loss = network.evaluate(&validation.inputs, &validation.labels);
            history.validation_loss.push(validation_loss);

            let training_accuracy = self.score(network, training);
            let validation_accuracy = self.score(network, validation);

            info!(
                epoch = self.epoch,
                training_loss = %format!("{training_loss:.6}"),
                validation_loss = %format!("{validation_loss:.6}"),
                training_accuracy = %format!("{training_accuracy:.4}"),
                validation_accuracy = %format!("{validation_accuracy:.4}"),
                "Epoch complete:",
            );

            self.epoch += 1;
            checkpoint(network, self);
        }

        history.report = Report {
            training: self.score(network, training),
            validation: self.score(network, validation),
            testing: self.score(network, test),
        };

        info!(
            training = %format!("{:.2}%", history.report.training * 100.0),
            validation = %format!("{:.2}%", history.report.validation * 100.0),
            testing = %format!("{:.2}%", history.report.testing * 100.0),
            "Final accuracy:",
        );

        history
    }

    fn score(&self, network: &mut Network, samples: &Samples) -> f32 {
        let outputs = network.forward(&samples.inputs, Mode::Infer);
        element_accuracy(&samples.labels, &outputs, ACCURACY_THRESHOLD)
    }
}

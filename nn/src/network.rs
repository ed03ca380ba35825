use serde::{Deserialize, Serialize};

use crate::layers::Layer;
use crate::loss::Objective;
use crate::tensor::Tensor;

pub use crate::layers::Mode;

/// An ordered pipeline of layers with an objective at the end.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Network {
    layers: Vec<Layer>,
    objective: Objective,
}

impl Network {
    pub fn new(layers: Vec<Layer>, objective: Objective) -> Self {
        Self { layers, objective }
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Runs the pipeline front to back.
    pub fn forward(&mut self, inputs: &Tensor, mode: Mode) -> Tensor {
        let mut outputs = inputs.clone();
        for layer in &mut self.layers {
            outputs = layer.forward(&outputs, mode);
        }
        outputs
    }

    /// Scores a batch of labeled inputs: an inference forward pass followed
    /// by the objective.
    pub fn evaluate(&mut self, inputs: &Tensor, labels: &Tensor) -> f32 {
        let outputs = self.forward(inputs, Mode::Infer);
        self.objective.eval(labels, &outputs)
    }

    /// Runs one minibatch of gradient descent: forward in train mode, the
    /// objective gradient, then a backward sweep that updates each layer's
    /// parameters as it goes.
    ///
    /// With `skip_first_layer` set, the sweep stops short of the first layer,
    /// which then receives neither a backward pass nor an update.
    pub fn train_batch(
        &mut self,
        t: usize,
        inputs: &Tensor,
        labels: &Tensor,
        rate: f32,
        l2_reg: f32,
        skip_first_layer: bool,
    ) -> f32 {
        let outputs = self.forward(inputs, Mode::Train);
        let error = self.objective.eval(labels, &outputs);

        let start = if skip_first_layer { 1 } else { 0 };

        let mut gradients = self.objective.gradient(labels, &outputs);
        for layer in self.layers[start..].iter_mut().rev() {
            gradients = layer.backward(&gradients);
            layer.descend(t, rate, l2_reg);
        }

        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::activation::Activation;
    use crate::gradient_descent::Descent;
    use crate::layers::{ActivationLayer, FullyConnected, Initializer};
    use crate::loss::mse;

    #[test]
    fn xor_net() {
        let inputs = Tensor::from_vec(
            vec![
                0.0, 0.0, //
                1.0, 0.0, //
                0.0, 1.0, //
                1.0, 1.0,
            ],
            &[4, 2],
        );
        let labels = Tensor::from_vec(vec![0.0, 1.0, 1.0, 0.0], &[4, 1]);

        let mut rng = rand::thread_rng();
        let mut network = Network::new(
            vec![
                FullyConnected::random(2, 10, Initializer::HeNormal, Descent::adam(), &mut rng)
                    .into(),
                ActivationLayer::new(Activation::Relu).into(),
                FullyConnected::random(10, 1, Initializer::GlorotUniform, Descent::adam(), &mut rng)
                    .into(),
                ActivationLayer::new(Activation::Tanh).into(),
            ],
            Objective::MeanSquaredError,
        );

        for t in 1..=1000 {
            network.train_batch(t, &inputs, &labels, 0.01, 0.0, false);
        }

        let outputs = network.forward(&inputs, Mode::Infer);
        let error = mse(&labels, &outputs);

        assert!(error < 0.001);
    }

    #[test]
    fn evaluate_scores_with_the_objective() {
        let mut network = Network::new(
            vec![ActivationLayer::new(Activation::Relu).into()],
            Objective::MeanSquaredError,
        );

        let inputs = Tensor::from_vec(vec![1.0, -2.0, 3.0], &[3, 1]);
        let labels = Tensor::from_vec(vec![0.0, 0.0, 3.0], &[3, 1]);

        // Relu passes 1 and 3 through and zeroes -2, so only the first row
        // contributes to the batch-averaged squared error.
        let loss = network.evaluate(&inputs, &labels);
        assert!((loss - 1.0 / 3.0).abs() < 1.0e-6);
    }

    #[test]
    fn skipped_first_layer_keeps_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let first =
            FullyConnected::random(2, 4, Initializer::HeNormal, Descent::simple(), &mut rng);
        let before = first.weights().clone();

        let mut network = Network::new(
            vec![
                first.into(),
                FullyConnected::random(4, 1, Initializer::GlorotUniform, Descent::simple(), &mut rng)
                    .into(),
            ],
            Objective::MeanSquaredError,
        );

        let inputs = Tensor::from_vec(vec![1.0, -1.0], &[1, 2]);
        let labels = Tensor::from_vec(vec![0.5], &[1, 1]);
        network.train_batch(1, &inputs, &labels, 0.1, 0.0, true);

        let Layer::FullyConnected(first) = &network.layers[0] else {
            unreachable!()
        };
        assert_eq!(first.weights(), &before);
    }
}

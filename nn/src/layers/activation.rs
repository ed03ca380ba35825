use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::tensor::Tensor;

use super::Mode;

/// Applies an activation function element-wise.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActivationLayer {
    activation: Activation,
    #[serde(skip)]
    inputs: Option<Tensor>,
}

impl ActivationLayer {
    pub fn new(activation: Activation) -> Self {
        Self {
            activation,
            inputs: None,
        }
    }

    pub fn forward(&mut self, inputs: &Tensor, mode: Mode) -> Tensor {
        let activation = self.activation;
        let outputs = inputs.clone().map(|x| activation.apply(x));

        if mode == Mode::Train {
            self.inputs = Some(inputs.clone());
        }

        outputs
    }

    pub fn backward(&mut self, output_gradients: &Tensor) -> Tensor {
        let inputs = self.inputs.take().expect("no forward pass to backtrack");

        // The derivative is taken at the cached pre-activation values.
        let mut input_gradients = output_gradients.clone();
        input_gradients
            .values_mut()
            .zip(inputs.values())
            .for_each(|(x, &o)| *x *= self.activation.prime(o));
        input_gradients
    }
}

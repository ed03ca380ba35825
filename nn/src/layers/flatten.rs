use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

use super::Mode;

/// Collapses `[B, d1, d2, ...]` inputs to `[B, d1 * d2 * ...]`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Flatten {
    #[serde(skip)]
    input_shape: Option<Vec<usize>>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, inputs: &Tensor, mode: Mode) -> Tensor {
        if mode == Mode::Train {
            self.input_shape = Some(inputs.shape().to_vec());
        }

        let shape = [inputs.rows(), inputs.row_size()];
        inputs.clone().reshape(&shape)
    }

    pub fn backward(&mut self, output_gradients: &Tensor) -> Tensor {
        let shape = self.input_shape.take().expect("no forward pass to backtrack");
        output_gradients.clone().reshape(&shape)
    }
}

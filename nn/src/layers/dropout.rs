use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

use super::Mode;

/// Inverted dropout: zeroes each value with probability `rate` during
/// training and scales the survivors by `1 / (1 - rate)`, so inference
/// needs no compensation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Dropout {
    rate: f32,
    #[serde(skip)]
    mask: Option<Tensor>,
}

impl Dropout {
    pub fn new(rate: f32) -> Self {
        debug_assert!((0.0..1.0).contains(&rate));
        Self { rate, mask: None }
    }

    pub fn forward(&mut self, inputs: &Tensor, mode: Mode) -> Tensor {
        if mode == Mode::Infer {
            return inputs.clone();
        }

        let mut rng = rand::thread_rng();
        let scale = 1.0 / (1.0 - self.rate);
        let mask = Tensor::from_fn(inputs.shape(), || {
            if rng.gen::<f32>() < self.rate {
                0.0
            } else {
                scale
            }
        });

        let outputs = inputs * &mask;
        self.mask = Some(mask);
        outputs
    }

    pub fn backward(&mut self, output_gradients: &Tensor) -> Tensor {
        let mask = self.mask.take().expect("no forward pass to backtrack");
        output_gradients * mask
    }
}

pub use self::activation::ActivationLayer;
pub use self::conv2d::Conv2d;
pub use self::dropout::Dropout;
pub use self::flatten::Flatten;
pub use self::fully_connected::FullyConnected;

mod activation;
mod conv2d;
mod dropout;
mod flatten;
mod fully_connected;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

/// Whether a forward pass is part of training or inference.
///
/// Training passes cache whatever the backward sweep needs and apply dropout;
/// inference passes do neither.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Infer,
    Train,
}

/// Weight initialization strategies.
#[derive(Clone, Copy, Debug)]
pub enum Initializer {
    GlorotUniform,
    HeNormal,
}

impl Initializer {
    pub fn tensor(
        self,
        shape: &[usize],
        fan_in: usize,
        fan_out: usize,
        rng: &mut impl Rng,
    ) -> Tensor {
        match self {
            Self::HeNormal => {
                let normal_distribution = Normal::new(0.0, (2.0 / fan_in as f32).sqrt()).unwrap();
                Tensor::from_fn(shape, || normal_distribution.sample(rng))
            }
            Self::GlorotUniform => {
                let range = 6.0f32.sqrt() / (fan_in as f32 + fan_out as f32).sqrt();
                let uniform_distribution = Uniform::new(-range, range);
                Tensor::from_fn(shape, || uniform_distribution.sample(rng))
            }
        }
    }
}

/// One stage of the layer pipeline.
///
/// Every variant supports the same three operations: a forward pass, a
/// backward pass that returns the gradients with respect to its inputs while
/// banking any parameter gradients, and a parameter update that spends them.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Layer {
    Activation(ActivationLayer),
    Conv2d(Conv2d),
    Dropout(Dropout),
    Flatten(Flatten),
    FullyConnected(FullyConnected),
}

impl Layer {
    pub fn forward(&mut self, inputs: &Tensor, mode: Mode) -> Tensor {
        match self {
            Self::Activation(layer) => layer.forward(inputs, mode),
            Self::Conv2d(layer) => layer.forward(inputs, mode),
            Self::Dropout(layer) => layer.forward(inputs, mode),
            Self::Flatten(layer) => layer.forward(inputs, mode),
            Self::FullyConnected(layer) => layer.forward(inputs, mode),
        }
    }

    pub fn backward(&mut self, output_gradients: &Tensor) -> Tensor {
        match self {
            Self::Activation(layer) => layer.backward(output_gradients),
            Self::Conv2d(layer) => layer.backward(output_gradients),
            Self::Dropout(layer) => layer.backward(output_gradients),
            Self::Flatten(layer) => layer.backward(output_gradients),
            Self::FullyConnected(layer) => layer.backward(output_gradients),
        }
    }

    pub fn descend(&mut self, t: usize, rate: f32, l2_reg: f32) {
        match self {
            Self::Conv2d(layer) => layer.descend(t, rate, l2_reg),
            Self::FullyConnected(layer) => layer.descend(t, rate, l2_reg),
            Self::Activation(_) | Self::Dropout(_) | Self::Flatten(_) => (),
        }
    }
}

impl From<ActivationLayer> for Layer {
    fn from(layer: ActivationLayer) -> Self {
        Self::Activation(layer)
    }
}

impl From<Conv2d> for Layer {
    fn from(layer: Conv2d) -> Self {
        Self::Conv2d(layer)
    }
}

impl From<Dropout> for Layer {
    fn from(layer: Dropout) -> Self {
        Self::Dropout(layer)
    }
}

impl From<Flatten> for Layer {
    fn from(layer: Flatten) -> Self {
        Self::Flatten(layer)
    }
}

impl From<FullyConnected> for Layer {
    fn from(layer: FullyConnected) -> Self {
        Self::FullyConnected(layer)
    }
}

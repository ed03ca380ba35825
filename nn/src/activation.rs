use serde::{Deserialize, Serialize};

pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

pub fn relu_prime(x: f32) -> f32 {
    match x > 0.0 {
        true => 1.0,
        false => 0.0,
    }
}

pub fn tanh(x: f32) -> f32 {
    x.tanh()
}

pub fn tanh_prime(x: f32) -> f32 {
    let x_tanh = x.tanh();
    1.0 - x_tanh * x_tanh
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub fn sigmoid_prime(x: f32) -> f32 {
    let s = sigmoid(x);
    s * (1.0 - s)
}

/// An element-wise activation function, nameable in a serialized model.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Relu => relu(x),
            Self::Sigmoid => sigmoid(x),
            Self::Tanh => tanh(x),
        }
    }

    pub fn prime(self, x: f32) -> f32 {
        match self {
            Self::Relu => relu_prime(x),
            Self::Sigmoid => sigmoid_prime(x),
            Self::Tanh => tanh_prime(x),
        }
    }
}

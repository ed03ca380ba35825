use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

pub trait GradientDescent {
    fn descend(
        &mut self,
        t: usize,
        gradients: &Tensor,
        parameters: &mut Tensor,
        rate: f32,
        l2_reg: f32,
    );
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Adam {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    momentum: Tensor,
    rms: Tensor,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, f32::EPSILON)
    }
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            beta1,
            beta2,
            epsilon,
            momentum: Tensor::zeros(&[0]),
            rms: Tensor::zeros(&[0]),
        }
    }
}

impl GradientDescent for Adam {
    fn descend(
        &mut self,
        t: usize,
        gradients: &Tensor,
        parameters: &mut Tensor,
        rate: f32,
        l2_reg: f32,
    ) {
        // The accumulators take the parameters' shape on first use.
        if self.momentum.is_empty() {
            self.momentum = Tensor::zeros(parameters.shape());
            self.rms = Tensor::zeros(parameters.shape());
        }

        // L2 regularization ====================

        let gradients = gradients + &*parameters * l2_reg;

        // Momentum update ======================

        self.momentum *= self.beta1;
        self.momentum += &gradients * (1.0 - self.beta1);

        // RMS update ===========================

        let mut gradients_squared = gradients;
        gradients_squared.values_mut().for_each(|x| *x *= *x);
        self.rms *= self.beta2;
        self.rms += gradients_squared * (1.0 - self.beta2);

        // Correction for bias ==================

        let momentum_c = &self.momentum / (1.0 - self.beta1.powi(t as i32));
        let rms_c = &self.rms / (1.0 - self.beta2.powi(t as i32));

        // Descend gradients ====================

        let rm = rms_c.map(|x| x.sqrt());
        *parameters -= momentum_c / (rm + self.epsilon) * rate;
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SimpleGradientDescent;

impl GradientDescent for SimpleGradientDescent {
    fn descend(
        &mut self,
        _t: usize,
        gradients: &Tensor,
        parameters: &mut Tensor,
        rate: f32,
        l2_reg: f32,
    ) {
        *parameters -= (gradients + &*parameters * l2_reg) * rate;
    }
}

/// A layer-ownable gradient descent strategy.
///
/// Trainable layers hold one of these per parameter tensor so that optimizer
/// state rides along in model checkpoints.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Descent {
    Adam(Adam),
    Simple(SimpleGradientDescent),
}

impl Descent {
    pub fn adam() -> Self {
        Self::Adam(Adam::default())
    }

    pub fn simple() -> Self {
        Self::Simple(SimpleGradientDescent)
    }
}

impl GradientDescent for Descent {
    fn descend(
        &mut self,
        t: usize,
        gradients: &Tensor,
        parameters: &mut Tensor,
        rate: f32,
        l2_reg: f32,
    ) {
        match self {
            Self::Adam(adam) => adam.descend(t, gradients, parameters, rate, l2_reg),
            Self::Simple(simple) => simple.descend(t, gradients, parameters, rate, l2_reg),
        }
    }
}

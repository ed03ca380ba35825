use serde::{Deserialize, Serialize};

use crate::tensor::Tensor;

const LOG_CLAMP: f32 = 1.0e-7;

/// The objective measured at the end of the layer pipeline.
///
/// This plays the original output layer's role: `eval` scores a batch of
/// outputs against its labels, and `gradient` produces the gradient of that
/// score with respect to the outputs, which seeds the backward sweep.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Objective {
    CrossEntropy,
    MeanSquaredError,
}

impl Objective {
    pub fn eval(self, labels: &Tensor, outputs: &Tensor) -> f32 {
        match self {
            Self::CrossEntropy => cross_entropy(labels, outputs),
            Self::MeanSquaredError => mse(labels, outputs),
        }
    }

    pub fn gradient(self, labels: &Tensor, outputs: &Tensor) -> Tensor {
        match self {
            Self::CrossEntropy => cross_entropy_prime(labels, outputs),
            Self::MeanSquaredError => mse_prime(labels, outputs),
        }
    }
}

/// Calculates the Mean Squared Error, averaged over the batch.
pub fn mse(labels: &Tensor, outputs: &Tensor) -> f32 {
    debug_assert_eq!(labels.shape(), outputs.shape());

    let batch = labels.rows() as f32;
    labels
        .values()
        .zip(outputs.values())
        .map(|(y, o)| (y - o) * (y - o))
        .sum::<f32>()
        / batch
}

/// Calculates the derivative of the Mean Squared Error function.
pub fn mse_prime(labels: &Tensor, outputs: &Tensor) -> Tensor {
    (outputs - labels) * 2.0 / labels.rows() as f32
}

/// Calculates the element-wise log loss, averaged over the batch.
///
/// Outputs are expected to be probabilities; they're clamped away from 0 and
/// 1 before the logs are taken.
pub fn cross_entropy(labels: &Tensor, outputs: &Tensor) -> f32 {
    debug_assert_eq!(labels.shape(), outputs.shape());

    let batch = labels.rows() as f32;
    labels
        .values()
        .zip(outputs.values())
        .map(|(y, o)| {
            let o = o.clamp(LOG_CLAMP, 1.0 - LOG_CLAMP);
            -(y * o.ln() + (1.0 - y) * (1.0 - o).ln())
        })
        .sum::<f32>()
        / batch
}

/// Calculates the derivative of the element-wise log loss.
pub fn cross_entropy_prime(labels: &Tensor, outputs: &Tensor) -> Tensor {
    let batch = labels.rows() as f32;
    let mut gradients = outputs.clone();
    gradients
        .values_mut()
        .zip(labels.values())
        .for_each(|(o, y)| {
            let p = o.clamp(LOG_CLAMP, 1.0 - LOG_CLAMP);
            *o = (p - y) / (p * (1.0 - p) * batch);
        });
    gradients
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_perfect_fit() {
        let y = Tensor::from_vec(vec![0.0, 1.0, 1.0, 0.0], &[4, 1]);
        assert_eq!(mse(&y, &y), 0.0);
        assert!(mse_prime(&y, &y).values().all(|&g| g == 0.0));
    }

    #[test]
    fn mse_known_value() {
        let y = Tensor::from_vec(vec![1.0, 0.0], &[2, 1]);
        let o = Tensor::from_vec(vec![0.5, 0.5], &[2, 1]);
        assert!((mse(&y, &o) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn cross_entropy_penalizes_confident_misses() {
        let y = Tensor::from_vec(vec![1.0, 0.0], &[1, 2]);
        let close = Tensor::from_vec(vec![0.9, 0.1], &[1, 2]);
        let far = Tensor::from_vec(vec![0.1, 0.9], &[1, 2]);
        assert!(cross_entropy(&y, &close) < cross_entropy(&y, &far));
    }

    #[test]
    fn cross_entropy_gradient_sign() {
        let y = Tensor::from_vec(vec![1.0, 0.0], &[1, 2]);
        let o = Tensor::from_vec(vec![0.3, 0.7], &[1, 2]);
        let g = cross_entropy_prime(&y, &o);
        // Pushing down the loss should raise the first output and lower the second.
        assert!(g.as_slice()[0] < 0.0);
        assert!(g.as_slice()[1] > 0.0);
    }
}

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::gradient_descent::{Descent, GradientDescent};
use crate::tensor::Tensor;

use super::{Initializer, Mode};

/// A dense layer: `outputs = inputs * weights + biases`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FullyConnected {
    weights: Tensor,
    biases: Tensor,
    weight_descent: Descent,
    bias_descent: Descent,
    #[serde(skip)]
    inputs: Option<Tensor>,
    #[serde(skip)]
    weight_gradients: Option<Tensor>,
    #[serde(skip)]
    bias_gradients: Option<Tensor>,
}

impl FullyConnected {
    pub fn random(
        inputs: usize,
        outputs: usize,
        initializer: Initializer,
        descent: Descent,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            weights: initializer.tensor(&[inputs, outputs], inputs, outputs, rng),
            biases: Tensor::zeros(&[outputs]),
            weight_descent: descent.clone(),
            bias_descent: descent,
            inputs: None,
            weight_gradients: None,
            bias_gradients: None,
        }
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    pub fn forward(&mut self, inputs: &Tensor, mode: Mode) -> Tensor {
        debug_assert_eq!(inputs.row_size(), self.weights.shape()[0]);

        let inputs = inputs
            .clone()
            .reshape(&[inputs.rows(), inputs.row_size()]);

        let mut outputs = inputs.matmul(&self.weights);
        outputs.add_to_rows(&self.biases);

        if mode == Mode::Train {
            self.inputs = Some(inputs);
        }

        outputs
    }

    pub fn backward(&mut self, output_gradients: &Tensor) -> Tensor {
        let inputs = self.inputs.take().expect("no forward pass to backtrack");

        self.weight_gradients = Some(inputs.transposed().matmul(output_gradients));
        self.bias_gradients = Some(output_gradients.sum_rows());

        output_gradients.matmul(&self.weights.transposed())
    }

    pub fn descend(&mut self, t: usize, rate: f32, l2_reg: f32) {
        if let (Some(weight_gradients), Some(bias_gradients)) =
            (self.weight_gradients.take(), self.bias_gradients.take())
        {
            self.weight_descent
                .descend(t, &weight_gradients, &mut self.weights, rate, l2_reg);
            self.bias_descent
                .descend(t, &bias_gradients, &mut self.biases, rate, l2_reg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_2x2(w: [f32; 4], b: [f32; 2]) -> FullyConnected {
        FullyConnected {
            weights: Tensor::from_vec(w.to_vec(), &[2, 2]),
            biases: Tensor::from_vec(b.to_vec(), &[2]),
            weight_descent: Descent::simple(),
            bias_descent: Descent::simple(),
            inputs: None,
            weight_gradients: None,
            bias_gradients: None,
        }
    }

    #[test]
    fn forward() {
        let mut layer = layer_2x2([1.0, 2.0, 3.0, 4.0], [0.5, -0.5]);
        let inputs = Tensor::from_vec(vec![1.0, 1.0], &[1, 2]);

        let outputs = layer.forward(&inputs, Mode::Infer);
        assert_eq!(outputs, Tensor::from_vec(vec![4.5, 5.5], &[1, 2]));
        assert!(layer.inputs.is_none());
    }

    #[test]
    fn backward_gradients() {
        let mut layer = layer_2x2([1.0, 2.0, 3.0, 4.0], [0.0, 0.0]);
        let inputs = Tensor::from_vec(vec![1.0, 2.0], &[1, 2]);

        layer.forward(&inputs, Mode::Train);
        let input_gradients = layer.backward(&Tensor::from_vec(vec![1.0, 1.0], &[1, 2]));

        // d/dw[i][o] = input[i] * grad[o]
        assert_eq!(
            layer.weight_gradients,
            Some(Tensor::from_vec(vec![1.0, 1.0, 2.0, 2.0], &[2, 2]))
        );
        // d/db[o] = grad[o]
        assert_eq!(
            layer.bias_gradients,
            Some(Tensor::from_vec(vec![1.0, 1.0], &[2]))
        );
        // d/dx[i] = sum_o grad[o] * w[i][o]
        assert_eq!(
            input_gradients,
            Tensor::from_vec(vec![3.0, 7.0], &[1, 2])
        );
    }

    #[test]
    fn descend_spends_gradients() {
        let mut layer = layer_2x2([1.0, 1.0, 1.0, 1.0], [0.0, 0.0]);
        let inputs = Tensor::from_vec(vec![1.0, 1.0], &[1, 2]);

        layer.forward(&inputs, Mode::Train);
        layer.backward(&Tensor::from_vec(vec![1.0, 1.0], &[1, 2]));
        layer.descend(1, 0.5, 0.0);

        assert_eq!(
            layer.weights,
            Tensor::from_vec(vec![0.5, 0.5, 0.5, 0.5], &[2, 2])
        );
        assert_eq!(layer.biases, Tensor::from_vec(vec![-0.5, -0.5], &[2]));
        assert!(layer.weight_gradients.is_none());
    }
}

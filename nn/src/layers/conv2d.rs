use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::gradient_descent::{Descent, GradientDescent};
use crate::tensor::Tensor;

use super::{Initializer, Mode};

/// A 2-D convolution over `[B, H, W, C]` inputs with stride 1 and zero
/// padding. Kernels are stored as `[KH, KW, CI, CO]`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Conv2d {
    kernels: Tensor,
    biases: Tensor,
    padding: usize,
    kernel_descent: Descent,
    bias_descent: Descent,
    #[serde(skip)]
    inputs: Option<Tensor>,
    #[serde(skip)]
    kernel_gradients: Option<Tensor>,
    #[serde(skip)]
    bias_gradients: Option<Tensor>,
}

impl Conv2d {
    pub fn random(
        kernel_size: usize,
        in_channels: usize,
        out_channels: usize,
        padding: usize,
        initializer: Initializer,
        descent: Descent,
        rng: &mut impl Rng,
    ) -> Self {
        let fan_in = kernel_size * kernel_size * in_channels;
        let fan_out = kernel_size * kernel_size * out_channels;

        Self {
            kernels: initializer.tensor(
                &[kernel_size, kernel_size, in_channels, out_channels],
                fan_in,
                fan_out,
                rng,
            ),
            biases: Tensor::zeros(&[out_channels]),
            padding,
            kernel_descent: descent.clone(),
            bias_descent: descent,
            inputs: None,
            kernel_gradients: None,
            bias_gradients: None,
        }
    }

    pub fn forward(&mut self, inputs: &Tensor, mode: Mode) -> Tensor {
        let (batch, height, width, in_channels) = dims4(inputs.shape());
        let (kernel_height, kernel_width, kernel_in, out_channels) = dims4(self.kernels.shape());
        debug_assert_eq!(in_channels, kernel_in);

        let out_height = height + 2 * self.padding + 1 - kernel_height;
        let out_width = width + 2 * self.padding + 1 - kernel_width;

        let mut outputs = Tensor::zeros(&[batch, out_height, out_width, out_channels]);

        let x = inputs.as_slice();
        let k = self.kernels.as_slice();
        let b = self.biases.as_slice();
        let out = outputs.as_mut_slice();

        for n in 0..batch {
            for oy in 0..out_height {
                for ox in 0..out_width {
                    let out_base = ((n * out_height + oy) * out_width + ox) * out_channels;
                    out[out_base..out_base + out_channels].copy_from_slice(b);

                    for ky in 0..kernel_height {
                        let iy = (oy + ky) as isize - self.padding as isize;
                        if iy < 0 || iy >= height as isize {
                            continue;
                        }
                        for kx in 0..kernel_width {
                            let ix = (ox + kx) as isize - self.padding as isize;
                            if ix < 0 || ix >= width as isize {
                                continue;
                            }

                            let in_base =
                                ((n * height + iy as usize) * width + ix as usize) * in_channels;
                            let k_base = (ky * kernel_width + kx) * in_channels * out_channels;

                            for ci in 0..in_channels {
                                let x_v = x[in_base + ci];
                                let k_row = k_base + ci * out_channels;
                                for co in 0..out_channels {
                                    out[out_base + co] += x_v * k[k_row + co];
                                }
                            }
                        }
                    }
                }
            }
        }

        if mode == Mode::Train {
            self.inputs = Some(inputs.clone());
        }

        outputs
    }

    pub fn backward(&mut self, output_gradients: &Tensor) -> Tensor {
        let inputs = self.inputs.take().expect("no forward pass to backtrack");

        let (batch, height, width, in_channels) = dims4(inputs.shape());
        let (kernel_height, kernel_width, _, out_channels) = dims4(self.kernels.shape());
        let (_, out_height, out_width, _) = dims4(output_gradients.shape());

        let mut kernel_gradients = Tensor::zeros(self.kernels.shape());
        let mut bias_gradients = Tensor::zeros(&[out_channels]);
        let mut input_gradients = Tensor::zeros(inputs.shape());

        let x = inputs.as_slice();
        let k = self.kernels.as_slice();
        let g = output_gradients.as_slice();
        let kg = kernel_gradients.as_mut_slice();
        let bg = bias_gradients.as_mut_slice();
        let ig = input_gradients.as_mut_slice();

        for n in 0..batch {
            for oy in 0..out_height {
                for ox in 0..out_width {
                    let g_base = ((n * out_height + oy) * out_width + ox) * out_channels;

                    for co in 0..out_channels {
                        bg[co] += g[g_base + co];
                    }

                    for ky in 0..kernel_height {
                        let iy = (oy + ky) as isize - self.padding as isize;
                        if iy < 0 || iy >= height as isize {
                            continue;
                        }
                        for kx in 0..kernel_width {
                            let ix = (ox + kx) as isize - self.padding as isize;
                            if ix < 0 || ix >= width as isize {
                                continue;
                            }

                            let in_base =
                                ((n * height + iy as usize) * width + ix as usize) * in_channels;
                            let k_base = (ky * kernel_width + kx) * in_channels * out_channels;

                            for ci in 0..in_channels {
                                let x_v = x[in_base + ci];
                                let k_row = k_base + ci * out_channels;
                                for co in 0..out_channels {
                                    let g_v = g[g_base + co];
                                    kg[k_row + co] += x_v * g_v;
                                    ig[in_base + ci] += g_v * k[k_row + co];
                                }
                            }
                        }
                    }
                }
            }
        }

        self.kernel_gradients = Some(kernel_gradients);
        self.bias_gradients = Some(bias_gradients);

        input_gradients
    }

    pub fn descend(&mut self, t: usize, rate: f32, l2_reg: f32) {
        if let (Some(kernel_gradients), Some(bias_gradients)) =
            (self.kernel_gradients.take(), self.bias_gradients.take())
        {
            self.kernel_descent
                .descend(t, &kernel_gradients, &mut self.kernels, rate, l2_reg);
            self.bias_descent
                .descend(t, &bias_gradients, &mut self.biases, rate, l2_reg);
        }
    }
}

fn dims4(shape: &[usize]) -> (usize, usize, usize, usize) {
    debug_assert_eq!(shape.len(), 4);
    (shape[0], shape[1], shape[2], shape[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones_kernel() -> Conv2d {
        Conv2d {
            kernels: Tensor::from_vec(vec![1.0; 4], &[2, 2, 1, 1]),
            biases: Tensor::zeros(&[1]),
            padding: 0,
            kernel_descent: Descent::simple(),
            bias_descent: Descent::simple(),
            inputs: None,
            kernel_gradients: None,
            bias_gradients: None,
        }
    }

    fn input_3x3() -> Tensor {
        Tensor::from_vec(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
            &[1, 3, 3, 1],
        )
    }

    #[test]
    fn forward_window_sums() {
        let mut layer = ones_kernel();
        let outputs = layer.forward(&input_3x3(), Mode::Infer);

        assert_eq!(
            outputs,
            Tensor::from_vec(vec![12.0, 16.0, 24.0, 28.0], &[1, 2, 2, 1])
        );
    }

    #[test]
    fn forward_same_padding() {
        let mut layer = ones_kernel();
        layer.padding = 1;

        let outputs = layer.forward(&input_3x3(), Mode::Infer);
        assert_eq!(outputs.shape(), &[1, 4, 4, 1]);

        // The top-left padded window only covers the top-left input value.
        assert_eq!(outputs.as_slice()[0], 1.0);
    }

    #[test]
    fn backward_gradients() {
        let mut layer = ones_kernel();

        layer.forward(&input_3x3(), Mode::Train);
        let input_gradients = layer.backward(&Tensor::from_vec(vec![1.0; 4], &[1, 2, 2, 1]));

        // Each kernel position accumulates its window sum.
        assert_eq!(
            layer.kernel_gradients,
            Some(Tensor::from_vec(
                vec![12.0, 16.0, 24.0, 28.0],
                &[2, 2, 1, 1]
            ))
        );
        assert_eq!(layer.bias_gradients, Some(Tensor::from_vec(vec![4.0], &[1])));

        // Each input value sees one gradient unit per window that covers it.
        assert_eq!(
            input_gradients,
            Tensor::from_vec(
                vec![1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0],
                &[1, 3, 3, 1]
            )
        );
    }

    #[test]
    fn backward_padded_gradients() {
        let mut layer = ones_kernel();
        layer.padding = 1;

        layer.forward(&input_3x3(), Mode::Train);
        let input_gradients = layer.backward(&Tensor::from_vec(vec![1.0; 16], &[1, 4, 4, 1]));

        // With a padding of 1 every kernel position slides over every input
        // value exactly once, so each position accumulates the total input
        // sum; positions over the padding contribute nothing.
        assert_eq!(
            layer.kernel_gradients,
            Some(Tensor::from_vec(vec![45.0; 4], &[2, 2, 1, 1]))
        );
        assert_eq!(
            layer.bias_gradients,
            Some(Tensor::from_vec(vec![16.0], &[1]))
        );

        // Border and interior values alike sit under four of the padded
        // windows.
        assert_eq!(input_gradients, Tensor::from_vec(vec![4.0; 9], &[1, 3, 3, 1]));
    }
}

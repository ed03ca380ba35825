use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A no-frills row-major array of f32 values with a runtime shape.
///
/// The first dimension is always the batch dimension.
#[derive(Clone, Deserialize, PartialEq, Serialize)]
pub struct Tensor {
    values: Vec<f32>,
    shape: Vec<usize>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            values: vec![0.0; shape.iter().product()],
            shape: shape.to_vec(),
        }
    }

    pub fn from_vec(values: Vec<f32>, shape: &[usize]) -> Self {
        debug_assert_eq!(values.len(), shape.iter().product::<usize>());
        Self {
            values,
            shape: shape.to_vec(),
        }
    }

    /// Builds a tensor by drawing every value from `f`.
    pub fn from_fn(shape: &[usize], f: impl FnMut() -> f32) -> Self {
        let len = shape.iter().product();
        Self {
            values: std::iter::repeat_with(f).take(len).collect(),
            shape: shape.to_vec(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The size of the batch dimension.
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    /// The number of values per batch row.
    pub fn row_size(&self) -> usize {
        self.shape[1..].iter().product()
    }

    pub fn reshape(mut self, shape: &[usize]) -> Self {
        debug_assert_eq!(self.values.len(), shape.iter().product::<usize>());
        self.shape = shape.to_vec();
        self
    }

    pub fn values(&self) -> impl Iterator<Item = &f32> {
        self.values.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.values.iter_mut()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn row(&self, i: usize) -> &[f32] {
        let size = self.row_size();
        &self.values[i * size..(i + 1) * size]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let size = self.row_size();
        &mut self.values[i * size..(i + 1) * size]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows()).map(|i| self.row(i))
    }

    /// Copies the given batch rows into a new tensor, in order.
    pub fn gather_rows(&self, indices: &[usize]) -> Self {
        let mut shape = self.shape.clone();
        shape[0] = indices.len();

        let mut values = Vec::with_capacity(indices.len() * self.row_size());
        for &i in indices {
            values.extend_from_slice(self.row(i));
        }

        Self { values, shape }
    }

    /// Copies a contiguous range of batch rows into a new tensor.
    pub fn slice_rows(&self, range: std::ops::Range<usize>) -> Self {
        let mut shape = self.shape.clone();
        shape[0] = range.len();

        let size = self.row_size();
        Self {
            values: self.values[range.start * size..range.end * size].to_vec(),
            shape,
        }
    }

    /// Applies `f` to every value.
    pub fn map(mut self, f: impl Fn(f32) -> f32) -> Self {
        self.values.iter_mut().for_each(|x| *x = f(*x));
        self
    }

    /// 2-D matrix multiply: `[R, C] * [C, S] -> [R, S]`.
    pub fn matmul(&self, rhs: &Tensor) -> Tensor {
        debug_assert_eq!(self.shape.len(), 2);
        debug_assert_eq!(rhs.shape.len(), 2);
        debug_assert_eq!(self.shape[1], rhs.shape[0]);

        let (r, s) = (self.shape[0], rhs.shape[1]);
        let mut result = Tensor::zeros(&[r, s]);

        for row in 0..r {
            let a = self.row(row);
            let out = result.row_mut(row);
            for (k, &a_k) in a.iter().enumerate() {
                let b = rhs.row(k);
                for (o, &b_k) in out.iter_mut().zip(b) {
                    *o += a_k * b_k;
                }
            }
        }

        result
    }

    /// 2-D transpose.
    pub fn transposed(&self) -> Tensor {
        debug_assert_eq!(self.shape.len(), 2);

        let (r, c) = (self.shape[0], self.shape[1]);
        let mut result = Tensor::zeros(&[c, r]);

        for row in 0..r {
            for column in 0..c {
                result.values[column * r + row] = self.values[row * c + column];
            }
        }

        result
    }

    /// Adds a single-row tensor to every batch row.
    pub fn add_to_rows(&mut self, row: &Tensor) {
        debug_assert_eq!(self.row_size(), row.len());
        for i in 0..self.rows() {
            for (o, b) in self.row_mut(i).iter_mut().zip(row.as_slice()) {
                *o += b;
            }
        }
    }

    /// Sums over the batch dimension, yielding a single row.
    pub fn sum_rows(&self) -> Tensor {
        let mut result = Tensor::zeros(&self.shape[1..]);
        for row in self.iter_rows() {
            for (o, x) in result.values_mut().zip(row) {
                *o += x;
            }
        }
        result
    }

    /// The index of the maximum value in each batch row.
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.iter_rows()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |(best, max), (i, &x)| {
                        if x > max {
                            (i, x)
                        } else {
                            (best, max)
                        }
                    })
                    .0
            })
            .collect()
    }
}

macro_rules! tensor_op_impl {
    ($op:ident, $op_method:ident, $op_assign:ident, $op_assign_method:ident) => {
        impl $op<Tensor> for Tensor {
            type Output = Tensor;

            fn $op_method(mut self, rhs: Tensor) -> Self::Output {
                self.$op_assign_method(&rhs);
                self
            }
        }

        impl $op<&Tensor> for Tensor {
            type Output = Tensor;

            fn $op_method(mut self, rhs: &Tensor) -> Self::Output {
                self.$op_assign_method(rhs);
                self
            }
        }

        impl $op<&Tensor> for &Tensor {
            type Output = Tensor;

            fn $op_method(self, rhs: &Tensor) -> Self::Output {
                self.clone().$op_method(rhs)
            }
        }

        impl $op<Tensor> for &Tensor {
            type Output = Tensor;

            fn $op_method(self, rhs: Tensor) -> Self::Output {
                self.clone().$op_method(&rhs)
            }
        }

        impl $op_assign<&Tensor> for Tensor {
            fn $op_assign_method(&mut self, rhs: &Tensor) {
                debug_assert_eq!(self.shape, rhs.shape);
                for (r, b) in self.values.iter_mut().zip(&rhs.values) {
                    (*r).$op_assign_method(b)
                }
            }
        }

        impl $op_assign<Tensor> for Tensor {
            fn $op_assign_method(&mut self, rhs: Tensor) {
                self.$op_assign_method(&rhs)
            }
        }
    };
}

tensor_op_impl!(Add, add, AddAssign, add_assign);
tensor_op_impl!(Sub, sub, SubAssign, sub_assign);
tensor_op_impl!(Mul, mul, MulAssign, mul_assign);
tensor_op_impl!(Div, div, DivAssign, div_assign);

macro_rules! scalar_op_impl {
    ($op:ident, $op_method:ident, $op_assign:ident, $op_assign_method:ident) => {
        impl $op<f32> for Tensor {
            type Output = Tensor;

            fn $op_method(mut self, rhs: f32) -> Self::Output {
                self.$op_assign_method(rhs);
                self
            }
        }

        impl $op<f32> for &Tensor {
            type Output = Tensor;

            fn $op_method(self, rhs: f32) -> Self::Output {
                self.clone().$op_method(rhs)
            }
        }

        impl $op_assign<f32> for Tensor {
            fn $op_assign_method(&mut self, rhs: f32) {
                for r in self.values.iter_mut() {
                    (*r).$op_assign_method(rhs)
                }
            }
        }
    };
}

scalar_op_impl!(Add, add, AddAssign, add_assign);
scalar_op_impl!(Sub, sub, SubAssign, sub_assign);
scalar_op_impl!(Mul, mul, MulAssign, mul_assign);
scalar_op_impl!(Div, div, DivAssign, div_assign);

impl Neg for Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output {
        self * -1.0
    }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output {
        self * -1.0
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{:?} ", self.shape)?;
        f.debug_list().entries(&self.values).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply() {
        let m = Tensor::from_vec(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], //
            &[2, 4],
        );
        let n = Tensor::from_vec(
            vec![
                1.0, 5.0, 9.0, //
                2.0, 6.0, 10.0, //
                3.0, 7.0, 11.0, //
                4.0, 8.0, 12.0,
            ],
            &[4, 3],
        );
        let o = Tensor::from_vec(vec![30.0, 70.0, 110.0, 70.0, 174.0, 278.0], &[2, 3]);
        assert_eq!(m.matmul(&n), o);
    }

    #[test]
    fn transpose() {
        let m = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], &[2, 4]);
        let n = Tensor::from_vec(vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0], &[4, 2]);
        assert_eq!(m.transposed(), n);
        assert_eq!(n.transposed(), m);
    }

    #[test]
    fn gather() {
        let m = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2]);
        let g = m.gather_rows(&[2, 0]);
        assert_eq!(g, Tensor::from_vec(vec![5.0, 6.0, 1.0, 2.0], &[2, 2]));
    }

    #[test]
    fn argmax() {
        let m = Tensor::from_vec(vec![0.1, 0.7, 0.2, 0.9, 0.0, 0.1], &[2, 3]);
        assert_eq!(m.argmax_rows(), vec![1, 0]);
    }

    #[test]
    fn row_broadcast() {
        let mut m = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        m.add_to_rows(&Tensor::from_vec(vec![10.0, 20.0], &[2]));
        assert_eq!(m, Tensor::from_vec(vec![11.0, 22.0, 13.0, 24.0], &[2, 2]));
        assert_eq!(m.sum_rows(), Tensor::from_vec(vec![24.0, 46.0], &[2]));
    }

    #[test]
    fn elementwise() {
        let m = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let n = Tensor::from_vec(vec![4.0, 3.0, 2.0, 1.0], &[2, 2]);
        assert_eq!(
            &m + &n,
            Tensor::from_vec(vec![5.0, 5.0, 5.0, 5.0], &[2, 2])
        );
        assert_eq!(
            &m * 2.0,
            Tensor::from_vec(vec![2.0, 4.0, 6.0, 8.0], &[2, 2])
        );
    }
}

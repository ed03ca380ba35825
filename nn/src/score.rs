use crate::tensor::Tensor;

/// Encodes class labels as one-hot rows.
pub fn one_hot(labels: &[usize], classes: usize) -> Tensor {
    let mut encoded = Tensor::zeros(&[labels.len(), classes]);
    for (i, &label) in labels.iter().enumerate() {
        debug_assert!(label < classes);
        encoded.row_mut(i)[label] = 1.0;
    }
    encoded
}

/// Decodes a batch of outputs back to class labels by row-wise argmax.
pub fn decode(outputs: &Tensor) -> Vec<usize> {
    outputs.argmax_rows()
}

/// The fraction of predicted labels that match the expected ones.
pub fn label_accuracy(expected: &[usize], predicted: &[usize]) -> f32 {
    debug_assert_eq!(expected.len(), predicted.len());

    let matches = expected
        .iter()
        .zip(predicted)
        .filter(|(e, p)| e == p)
        .count();
    matches as f32 / expected.len() as f32
}

/// The mean element-wise match between one-hot labels and outputs binarized
/// at `threshold`.
pub fn element_accuracy(labels: &Tensor, outputs: &Tensor, threshold: f32) -> f32 {
    debug_assert_eq!(labels.shape(), outputs.shape());

    let matches = labels
        .values()
        .zip(outputs.values())
        .filter(|(&y, &o)| {
            let o = if o > threshold { 1.0 } else { 0.0 };
            y == o
        })
        .count();
    matches as f32 / labels.len() as f32
}

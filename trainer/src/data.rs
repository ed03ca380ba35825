use std::fs;
use std::io;
use std::path::Path;

use nn::score::one_hot;
use nn::tensor::Tensor;
use nn::train::Samples;

pub const IMAGE_SIZE: usize = 32;
pub const CLASSES: usize = 10;

const CHANNEL_SIZE: usize = IMAGE_SIZE * IMAGE_SIZE;
// One label byte followed by the red, green, and blue planes.
const RECORD_SIZE: usize = 1 + 3 * CHANNEL_SIZE;

/// Grayscale images as a `[N, 32, 32, 1]` tensor, values in [0, 1], with
/// their class labels alongside.
#[derive(Clone, Debug)]
pub struct DataSet {
    pub images: Tensor,
    pub labels: Vec<usize>,
}

impl DataSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pairs the images with one-hot labels for the trainer.
    pub fn samples(&self) -> Samples {
        Samples {
            inputs: self.images.clone(),
            labels: one_hot(&self.labels, CLASSES),
        }
    }
}

/// Loads and concatenates the five CIFAR-10 training batches.
pub fn load_training_data(dir: &Path) -> io::Result<DataSet> {
    let mut values = Vec::new();
    let mut labels = Vec::new();

    for i in 1..=5 {
        let bytes = fs::read(dir.join(format!("data_batch_{i}.bin")))?;
        parse_batch(&bytes, &mut values, &mut labels)?;
    }

    Ok(build(values, labels))
}

/// Loads the CIFAR-10 test batch.
pub fn load_test_data(dir: &Path) -> io::Result<DataSet> {
    let mut values = Vec::new();
    let mut labels = Vec::new();

    let bytes = fs::read(dir.join("test_batch.bin"))?;
    parse_batch(&bytes, &mut values, &mut labels)?;

    Ok(build(values, labels))
}

/// Splits off the tail of the dataset as a validation set.
///
/// A non-empty dataset always yields at least one validation row, since an
/// empty split would make the validation loss and accuracy meaningless.
pub fn split(dataset: DataSet, validation_fraction: f32) -> (DataSet, DataSet) {
    debug_assert!(validation_fraction > 0.0 && validation_fraction < 1.0);

    let total = dataset.len();
    let validation_rows = (total as f32 * validation_fraction) as usize;
    let validation_rows = validation_rows.max(1).min(total);
    let boundary = total - validation_rows;

    let training = DataSet {
        images: dataset.images.slice_rows(0..boundary),
        labels: dataset.labels[..boundary].to_vec(),
    };
    let validation = DataSet {
        images: dataset.images.slice_rows(boundary..total),
        labels: dataset.labels[boundary..].to_vec(),
    };

    (training, validation)
}

fn parse_batch(bytes: &[u8], values: &mut Vec<f32>, labels: &mut Vec<usize>) -> io::Result<()> {
    if bytes.is_empty() || bytes.len() % RECORD_SIZE != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "truncated batch file",
        ));
    }

    for record in bytes.chunks_exact(RECORD_SIZE) {
        labels.push(record[0] as usize);

        let (red, rest) = record[1..].split_at(CHANNEL_SIZE);
        let (green, blue) = rest.split_at(CHANNEL_SIZE);

        // ITU-R 601 luma, normalized to [0, 1].
        for i in 0..CHANNEL_SIZE {
            let luma =
                0.299 * red[i] as f32 + 0.587 * green[i] as f32 + 0.114 * blue[i] as f32;
            values.push(luma / 255.0);
        }
    }

    Ok(())
}

fn build(values: Vec<f32>, labels: Vec<usize>) -> DataSet {
    let count = labels.len();
    DataSet {
        images: Tensor::from_vec(values, &[count, IMAGE_SIZE, IMAGE_SIZE, 1]),
        labels,
    }
}

//! Conversion between host image batches and device tensors.
//!
//! Image batches on the host are `ndarray::Array4<f32>` in NCHW order, the
//! same layout the model consumes.

use burn::prelude::*;
use ndarray::Array4;

use crate::core::{AEError, AEResult};

/// Copy an NCHW image batch to `device`.
pub fn image_batch_to_tensor<B: Backend>(batch: &Array4<f32>, device: &B::Device) -> Tensor<B, 4> {
    let (n, c, h, w) = batch.dim();
    let data: Vec<f32> = match batch.as_slice() {
        Some(slice) => slice.to_vec(),
        None => batch.iter().copied().collect(),
    };
    Tensor::from_data(TensorData::new(data, [n, c, h, w]), device)
}

/// Read an NCHW tensor back into an `Array4<f32>`.
///
/// # Errors
/// - `Data` if the tensor's element type cannot be read as `f32`
pub fn tensor_to_image_batch<B: Backend>(tensor: Tensor<B, 4>) -> AEResult<Array4<f32>> {
    let [n, c, h, w] = tensor.dims();
    let data: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| AEError::Data(format!("{e:?}")))?;
    Array4::from_shape_vec((n, c, h, w), data)
        .map_err(|e| AEError::ShapeMismatch(format!("cannot rebuild image batch: {e}")))
}

/// Read a one-element loss tensor as `f32`.
///
/// # Errors
/// - `ShapeMismatch` if the tensor does not hold exactly one value
pub fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> AEResult<f32> {
    let values: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| AEError::Data(format!("{e:?}")))?;
    match values.as_slice() {
        [value] => Ok(*value),
        other => Err(AEError::ShapeMismatch(format!(
            "expected a single value, got {}",
            other.len()
        ))),
    }
}

/// Min/max rescale into `[0, 1]`, the range of the decoder's sigmoid output.
///
/// Constant data is left untouched.
pub fn scale_to_unit(data: &mut [f32]) {
    let data_min = data.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let data_max = data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let range = data_max - data_min;

    if !(range > 0.0) {
        return;
    }

    for v in data {
        *v = (*v - data_min) / range;
    }
}

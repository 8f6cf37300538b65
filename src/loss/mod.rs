//! Reconstruction and layer-wise feature-matching losses.
//!
//! Both losses are mean squared errors. Shapes are checked before any tensor
//! arithmetic so a misconfigured pair surfaces as
//! [`AEError::ShapeMismatch`] instead of being broadcast.
//!
//! ```text
//! L_recon = mean((x' - x)^2)
//! L_layer = alpha * Σ_i mean((e_i - d_{n+1-i})^2)
//! ```

use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::*;

use crate::core::{AEError, AEResult};

/// Default scale for the summed layer-wise loss.
pub const DEFAULT_LAYER_LOSS_WEIGHT: f64 = 0.01;

fn mse<B: Backend, const D: usize>(
    lhs: Tensor<B, D>,
    rhs: Tensor<B, D>,
    what: &str,
) -> AEResult<Tensor<B, 1>> {
    let (l, r) = (lhs.dims(), rhs.dims());
    if l != r {
        return Err(AEError::ShapeMismatch(format!(
            "{what}: {l:?} vs {r:?}"
        )));
    }
    Ok(MseLoss::new().forward(lhs, rhs, Reduction::Mean))
}

/// Pixel-wise mean squared error between a reconstruction and its source.
///
/// # Errors
/// - `ShapeMismatch` if the two batches differ in any dimension
pub fn reconstruction_loss<B: Backend>(
    reconstruction: Tensor<B, 4>,
    original: Tensor<B, 4>,
) -> AEResult<Tensor<B, 1>> {
    mse(reconstruction, original, "reconstruction vs original")
}

/// Weighted sum of per-pair MSE between encoder and decoder activations.
///
/// `encoder` is ordered shallow to deep. `decoder` is ordered as the decoder
/// produced it, so it is walked in reverse: encoder activation `i` is
/// matched against decoder activation `n + 1 - i`.
///
/// # Errors
/// - `ShapeMismatch` if the lists differ in length or a pair differs in shape
/// - `InvalidConfig` if there are no pairs at all
pub fn layer_loss<B: Backend>(
    encoder: &[Tensor<B, 4>],
    decoder: &[Tensor<B, 4>],
    weight: f64,
) -> AEResult<Tensor<B, 1>> {
    if encoder.len() != decoder.len() {
        return Err(AEError::ShapeMismatch(format!(
            "{} encoder activations vs {} decoder activations",
            encoder.len(),
            decoder.len()
        )));
    }

    let mut total: Option<Tensor<B, 1>> = None;
    for (i, (e, d)) in encoder.iter().zip(decoder.iter().rev()).enumerate() {
        let pair = mse(
            e.clone(),
            d.clone(),
            &format!("encoder activation {} vs decoder activation {}", i + 1, encoder.len() - i),
        )?;
        total = Some(match total {
            Some(sum) => sum + pair,
            None => pair,
        });
    }

    total
        .map(|sum| sum.mul_scalar(weight))
        .ok_or_else(|| AEError::InvalidConfig("no activation pairs to compare".to_string()))
}

//! Optimizer set-up and a single gradient step.
//!
//! The total objective is the pixel reconstruction loss plus the model's
//! weighted layer loss. Epoch loops, data shuffling and scheduling belong to
//! the caller.

use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use tracing::debug;

use crate::core::{AEResult, AutoEncoder};
use crate::data::scalar;
use crate::loss::reconstruction_loss;

/// Optimizer settings.
#[derive(Config)]
pub struct TrainingConfig {
    #[config(default = 1e-4)]
    pub learning_rate: f64,
    #[config(default = "AdamConfig::new()")]
    pub optimizer: AdamConfig,
}

impl TrainingConfig {
    /// Adam optimizer for an [`AutoEncoder`] on an autodiff backend.
    pub fn init_optimizer<B: AutodiffBackend>(&self) -> impl Optimizer<AutoEncoder<B>, B> {
        self.optimizer.init::<B, AutoEncoder<B>>()
    }
}

/// Loss values observed during one [`train_step`], before the update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub reconstruction_loss: f32,
    pub layer_loss: f32,
    pub total_loss: f32,
}

/// Forward, backward and one optimizer update on a batch of images.
///
/// The model is consumed and the updated model returned, so there is only
/// ever one owner of the parameters.
///
/// # Errors
/// - `ShapeMismatch` if the batch does not fit the model
pub fn train_step<B, O>(
    model: AutoEncoder<B>,
    optimizer: &mut O,
    images: Tensor<B, 4>,
    learning_rate: f64,
) -> AEResult<(AutoEncoder<B>, StepMetrics)>
where
    B: AutodiffBackend,
    O: Optimizer<AutoEncoder<B>, B>,
{
    let output = model.forward(images.clone())?;
    let recon = reconstruction_loss(output.reconstruction, images)?;
    let total = recon.clone() + output.layer_loss.clone();

    let metrics = StepMetrics {
        reconstruction_loss: scalar(recon)?,
        layer_loss: scalar(output.layer_loss)?,
        total_loss: scalar(total.clone())?,
    };

    let grads = total.backward();
    let grads = GradientsParams::from_grads(grads, &model);
    let model = optimizer.step(learning_rate, model, grads);

    debug!(
        recon = metrics.reconstruction_loss,
        layer = metrics.layer_loss,
        total = metrics.total_loss,
        "train step"
    );
    Ok((model, metrics))
}

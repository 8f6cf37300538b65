//! Core autoencoder: configuration, error type, and the encoder/decoder model.
//!
//! The forward pass is a pure function of parameters and input:
//!
//! ```text
//! image ─► encoder blocks ─► flatten ─► linear ─► latent
//!            │ e1..en                                │
//!            │                 linear ─► relu ─► reshape (d1)
//!            │                                       │
//!            │                      decoder blocks ─► d2..dn ─► image'
//!            └──────── layer loss: e_i ↔ d_{n+1-i} ──┘
//! ```
//!
//! Every encoder activation is matched against the decoder activation of the
//! same shape, walking the decoder list in reverse.

pub mod architecture;
pub mod blocks;

use burn::module::Ignored;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;
use thiserror::Error;
use tracing::{debug, info};

use crate::loss::layer_loss;
use architecture::{ActivationShape, Architecture};
use blocks::ConvBlock;

/// Error type for autoencoder operations.
#[derive(Debug, Clone, Error)]
pub enum AEError {
    /// Tensor dimensions disagree with what the model or loss expects
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// The configured architecture cannot be built
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    /// Tensor data could not be read back to the host
    #[error("Tensor data error: {0}")]
    Data(String),
}

pub type AEResult<T> = Result<T, AEError>;

/// Construction parameters for [`AutoEncoder`].
///
/// The defaults reproduce the reference layout: 3-channel 320x160 images,
/// base width 128 (`x1, x2, x4, x8, x8` across five blocks) and a
/// 1000-dimensional latent vector.
#[derive(Config, Debug)]
pub struct AutoEncoderConfig {
    /// Input image channels; also the reconstruction's channel count.
    #[config(default = 3)]
    pub channels: usize,
    /// Channel width of the first encoder block.
    #[config(default = 128)]
    pub init_output_size: usize,
    #[config(default = 1000)]
    pub latent_variable_size: usize,
    #[config(default = 320)]
    pub input_height: usize,
    #[config(default = 160)]
    pub input_width: usize,
    /// Per-block multipliers of `init_output_size`; one entry per encoder block.
    #[config(default = "vec![1, 2, 4, 8, 8]")]
    pub width_multipliers: Vec<usize>,
    /// Scale applied to the summed layer-wise feature-matching loss.
    #[config(default = 0.01)]
    pub layer_loss_weight: f64,
}

impl AutoEncoderConfig {
    /// Plan the mirrored block layout for this configuration.
    pub fn architecture(&self) -> Architecture {
        let widths: Vec<usize> = self
            .width_multipliers
            .iter()
            .map(|m| m * self.init_output_size)
            .collect();
        Architecture::mirrored(
            ActivationShape::new(self.channels, self.input_height, self.input_width),
            &widths,
            self.latent_variable_size,
        )
    }

    /// Returns the initialized model on `device`.
    ///
    /// # Errors
    /// - `InvalidConfig` if the planned layout is not buildable or its encoder
    ///   and decoder activations do not mirror each other
    pub fn init<B: Backend>(&self, device: &B::Device) -> AEResult<AutoEncoder<B>> {
        if !(self.layer_loss_weight >= 0.0) {
            return Err(AEError::InvalidConfig(format!(
                "layer loss weight must be non-negative, got {}",
                self.layer_loss_weight
            )));
        }
        let architecture = self.architecture();
        architecture.validate()?;
        let flatten_width = architecture.flatten_width()?;

        let encoder = architecture
            .encoder
            .iter()
            .map(|spec| ConvBlock::new(spec, device))
            .collect();
        let decoder = architecture
            .decoder
            .iter()
            .map(|spec| ConvBlock::new(spec, device))
            .collect();

        let model = AutoEncoder {
            encoder,
            project: LinearConfig::new(flatten_width, self.latent_variable_size).init(device),
            expand: LinearConfig::new(self.latent_variable_size, flatten_width).init(device),
            decoder,
            layer_loss_weight: Ignored(self.layer_loss_weight),
            architecture: Ignored(architecture),
        };

        info!(
            params = model.num_params(),
            latent = self.latent_variable_size,
            height = self.input_height,
            width = self.input_width,
            blocks = model.encoder.len(),
            "initialized autoencoder"
        );
        Ok(model)
    }
}

/// Output of [`AutoEncoder::encode`].
#[derive(Debug, Clone)]
pub struct Encoded<B: Backend> {
    /// `[batch, latent_variable_size]`
    pub latent: Tensor<B, 2>,
    /// Encoder block outputs, shallow to deep.
    pub activations: Vec<Tensor<B, 4>>,
}

/// Output of [`AutoEncoder::decode`].
#[derive(Debug, Clone)]
pub struct Decoded<B: Backend> {
    /// `[batch, channels, height, width]`, values in `[0, 1]`
    pub reconstruction: Tensor<B, 4>,
    /// Reshaped latent projection followed by every hidden decoder block
    /// output, in the order they were produced.
    pub activations: Vec<Tensor<B, 4>>,
}

/// Output of [`AutoEncoder::forward`].
#[derive(Debug, Clone)]
pub struct ForwardOutput<B: Backend> {
    pub reconstruction: Tensor<B, 4>,
    /// Weighted layer-wise feature-matching loss, shape `[1]`.
    pub layer_loss: Tensor<B, 1>,
}

/// Convolutional autoencoder with mirrored encoder/decoder pipelines.
#[derive(Module, Debug)]
pub struct AutoEncoder<B: Backend> {
    encoder: Vec<ConvBlock<B>>,
    /// Flattened deepest feature map -> latent.
    project: Linear<B>,
    /// Latent -> flattened latent grid.
    expand: Linear<B>,
    decoder: Vec<ConvBlock<B>>,
    layer_loss_weight: Ignored<f64>,
    architecture: Ignored<Architecture>,
}

impl<B: Backend> AutoEncoder<B> {
    pub fn architecture(&self) -> &Architecture {
        &self.architecture.0
    }

    pub fn layer_loss_weight(&self) -> f64 {
        self.layer_loss_weight.0
    }

    /// Device the parameters live on.
    pub fn device(&self) -> B::Device {
        self.project.weight.val().device()
    }

    /// Run the encoder pipeline.
    ///
    /// # Shapes
    ///   - images `[batch, channels, height, width]`
    ///   - latent `[batch, latent_variable_size]`
    ///
    /// # Errors
    /// - `ShapeMismatch` if the channel count is wrong, or if the image
    ///   resolution differs from the one the latent projection was sized for
    pub fn encode(&self, images: Tensor<B, 4>) -> AEResult<Encoded<B>> {
        let arch = self.architecture();
        let [batch, channels, height, width] = images.dims();
        if channels != arch.input.channels {
            return Err(AEError::ShapeMismatch(format!(
                "encoder expects {} input channels, got {channels}",
                arch.input.channels
            )));
        }

        let expected = arch.flatten_width()?;
        let deepest = arch.latent_grid()?;
        // Stride-2 convs round down, so only the exact resolution is accepted.
        if (height, width) != (arch.input.height, arch.input.width) {
            return Err(AEError::ShapeMismatch(format!(
                "latent projection expects {expected} input features ({deepest}) \
                 from a {}x{} image, got a {height}x{width} image",
                arch.input.height, arch.input.width
            )));
        }

        let mut x = images;
        let mut activations = Vec::with_capacity(self.encoder.len());
        for block in &self.encoder {
            x = block.forward(x);
            activations.push(x.clone());
        }

        let latent = self.project.forward(x.reshape([batch, expected]));
        debug!(batch, height, width, deepest = %deepest, "encoded batch");

        Ok(Encoded {
            latent,
            activations,
        })
    }

    /// Run the decoder pipeline.
    ///
    /// # Shapes
    ///   - latent `[batch, latent_variable_size]`
    ///   - reconstruction `[batch, channels, height, width]`
    ///
    /// # Errors
    /// - `ShapeMismatch` if the latent width differs from `latent_variable_size`
    pub fn decode(&self, latent: Tensor<B, 2>) -> AEResult<Decoded<B>> {
        let arch = self.architecture();
        let [batch, width] = latent.dims();
        if width != arch.latent_size {
            return Err(AEError::ShapeMismatch(format!(
                "decoder expects latent width {}, got {width}",
                arch.latent_size
            )));
        }
        let (output, hidden) = self
            .decoder
            .split_last()
            .ok_or_else(|| AEError::InvalidConfig("decoder has no blocks".to_string()))?;

        let [c, h, w] = arch.latent_grid()?.dims();
        let mut x = activation::relu(self.expand.forward(latent)).reshape([batch, c, h, w]);

        let mut activations = Vec::with_capacity(self.decoder.len());
        activations.push(x.clone());
        for block in hidden {
            x = block.forward(x);
            activations.push(x.clone());
        }
        let reconstruction = output.forward(x);
        debug!(batch, shape = ?reconstruction.dims(), "decoded batch");

        Ok(Decoded {
            reconstruction,
            activations,
        })
    }

    /// Encode, decode and compute the weighted layer-wise loss.
    pub fn forward(&self, images: Tensor<B, 4>) -> AEResult<ForwardOutput<B>> {
        let encoded = self.encode(images)?;
        let decoded = self.decode(encoded.latent)?;
        let layer_loss = layer_loss(
            &encoded.activations,
            &decoded.activations,
            self.layer_loss_weight(),
        )?;
        Ok(ForwardOutput {
            reconstruction: decoded.reconstruction,
            layer_loss,
        })
    }

    /// Latent vectors only, discarding the encoder activations.
    pub fn get_latent(&self, images: Tensor<B, 4>) -> AEResult<Tensor<B, 2>> {
        Ok(self.encode(images)?.latent)
    }
}

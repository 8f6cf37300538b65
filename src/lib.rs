//! # Convolutional autoencoder with layer-wise feature matching
//!
//! An image autoencoder built on [burn](https://burn.dev). The encoder halves
//! the resolution block by block down to a dense latent vector; the decoder
//! mirrors it back up to a `[0, 1]` image. Besides the usual pixel
//! reconstruction loss, every encoder activation is compared with the decoder
//! activation of the same shape, giving an auxiliary layer loss.
//!
//! ## Structure
//!
//! - [`core`] — Configuration, block layout planning, the model itself
//! - [`loss`] — Reconstruction and layer-wise losses
//! - [`training`] — Adam set-up and a single training step
//! - [`data`] — Host `ndarray` batches to and from device tensors
//! - [`backend`] — Backend aliases and explicit device selection
//!
//! ## Example
//!
//! ```no_run
//! use conv_autoencoder::backend::{cpu_device, CpuBackend};
//! use conv_autoencoder::{reconstruction_loss, AutoEncoderConfig};
//! use burn::tensor::{Distribution, Tensor};
//!
//! let device = cpu_device();
//! let model = AutoEncoderConfig::new().init::<CpuBackend>(&device)?;
//! let images = Tensor::random([2, 3, 320, 160], Distribution::Uniform(0.0, 1.0), &device);
//! let out = model.forward(images.clone())?;
//! let total = reconstruction_loss(out.reconstruction, images)? + out.layer_loss;
//! # Ok::<(), conv_autoencoder::AEError>(())
//! ```

pub mod backend;
pub mod core;
pub mod data;
pub mod loss;
pub mod training;

pub use self::core::architecture::{ActivationShape, Architecture, BlockSpec, Nonlinearity, Padding};
pub use self::core::{AEError, AEResult, AutoEncoder, AutoEncoderConfig, Decoded, Encoded, ForwardOutput};
pub use loss::{layer_loss, reconstruction_loss, DEFAULT_LAYER_LOSS_WEIGHT};
pub use training::{train_step, StepMetrics, TrainingConfig};

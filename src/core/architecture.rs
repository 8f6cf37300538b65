//! Block specifications and shape planning for the autoencoder.
//!
//! The encoder and decoder are both described as ordered lists of
//! [`BlockSpec`]s. Shapes are computed here with plain convolution
//! arithmetic, so the mirrored encoder/decoder symmetry can be checked
//! before a single parameter is allocated:
//!
//! ```text
//! up  = in * upsample
//! out = (up + 2 * pad - kernel) / stride + 1
//! ```
//!
//! Encoder activation `i` (1-based) must equal decoder activation `n + 1 - i`,
//! where the decoder's first activation is the reshaped latent projection and
//! the remaining ones are the outputs of every block except the last.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AEError, AEResult};

/// Negative slope shared by every leaky rectification in the network.
pub const LEAKY_RELU_SLOPE: f64 = 0.2;

/// Batch-norm epsilon for encoder blocks (framework default).
pub const ENCODER_NORM_EPSILON: f64 = 1e-5;

/// Batch-norm epsilon for decoder blocks.
pub const DECODER_NORM_EPSILON: f64 = 1e-3;

/// Nonlinearity applied at the end of a block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Nonlinearity {
    LeakyRelu(f64),
    Relu,
    Sigmoid,
}

/// How a block pads its input before the convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Padding {
    /// Zero padding applied by the convolution itself.
    Zero(usize),
    /// Edge replication applied before a valid convolution.
    Replicate(usize),
}

impl Padding {
    pub fn amount(self) -> usize {
        match self {
            Padding::Zero(p) | Padding::Replicate(p) => p,
        }
    }
}

/// One stage of the encoder or decoder pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub channels_in: usize,
    pub channels_out: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: Padding,
    /// Nearest-neighbour scale factor applied before padding.
    pub upsample: Option<usize>,
    /// Batch-norm epsilon; `None` disables normalization.
    pub norm_epsilon: Option<f64>,
    pub activation: Nonlinearity,
}

impl BlockSpec {
    /// Stride-2, kernel-4 downsampling block: conv -> batch norm -> leaky ReLU.
    pub fn downsample(channels_in: usize, channels_out: usize) -> Self {
        Self {
            channels_in,
            channels_out,
            kernel_size: 4,
            stride: 2,
            padding: Padding::Zero(1),
            upsample: None,
            norm_epsilon: Some(ENCODER_NORM_EPSILON),
            activation: Nonlinearity::LeakyRelu(LEAKY_RELU_SLOPE),
        }
    }

    /// Upsample x2 -> replication pad -> kernel-3 conv -> batch norm -> leaky ReLU.
    pub fn upsample(channels_in: usize, channels_out: usize) -> Self {
        Self {
            channels_in,
            channels_out,
            kernel_size: 3,
            stride: 1,
            padding: Padding::Replicate(1),
            upsample: Some(2),
            norm_epsilon: Some(DECODER_NORM_EPSILON),
            activation: Nonlinearity::LeakyRelu(LEAKY_RELU_SLOPE),
        }
    }

    /// Final decoder block: same as [`BlockSpec::upsample`] without
    /// normalization and with a sigmoid, so the image lands in `[0, 1]`.
    pub fn output(channels_in: usize, channels_out: usize) -> Self {
        Self {
            norm_epsilon: None,
            activation: Nonlinearity::Sigmoid,
            ..Self::upsample(channels_in, channels_out)
        }
    }

    /// Output shape of this block for an input of the given shape.
    ///
    /// # Errors
    /// - `ShapeMismatch` if the channel count differs from `channels_in` or the
    ///   kernel does not fit the (padded) input.
    pub fn output_shape(&self, input: ActivationShape) -> AEResult<ActivationShape> {
        if input.channels != self.channels_in {
            return Err(AEError::ShapeMismatch(format!(
                "block expects {} input channels, got {}",
                self.channels_in, input.channels
            )));
        }
        let scale = self.upsample.unwrap_or(1);
        let pad = self.padding.amount();
        let spatial = |size: usize| -> AEResult<usize> {
            let padded = size * scale + 2 * pad;
            if self.stride == 0 || padded < self.kernel_size {
                return Err(AEError::ShapeMismatch(format!(
                    "kernel {} with stride {} does not fit a padded extent of {padded}",
                    self.kernel_size, self.stride
                )));
            }
            Ok((padded - self.kernel_size) / self.stride + 1)
        };
        Ok(ActivationShape {
            channels: self.channels_out,
            height: spatial(input.height)?,
            width: spatial(input.width)?,
        })
    }
}

/// Per-sample `(channels, height, width)` of a feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl ActivationShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    pub fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

impl fmt::Display for ActivationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

fn invalid(msg: String) -> AEResult<()> {
    Err(AEError::InvalidConfig(msg))
}

/// Full layout of an autoencoder: both block pipelines plus the image and
/// latent sizes they were planned for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    pub input: ActivationShape,
    pub latent_size: usize,
    pub encoder: Vec<BlockSpec>,
    pub decoder: Vec<BlockSpec>,
}

impl Architecture {
    /// Build the mirrored layout from per-block encoder widths.
    ///
    /// The decoder walks the encoder widths in reverse and finishes with an
    /// output block back to `input.channels`. For widths `[W, 2W, 4W, 8W, 8W]`
    /// this yields decoder channels `8W -> 8W -> 4W -> 2W -> W -> C`.
    pub fn mirrored(input: ActivationShape, widths: &[usize], latent_size: usize) -> Self {
        let mut encoder = Vec::with_capacity(widths.len());
        let mut channels_in = input.channels;
        for &width in widths {
            encoder.push(BlockSpec::downsample(channels_in, width));
            channels_in = width;
        }

        let mut decoder = Vec::with_capacity(widths.len());
        for pair in widths.windows(2).rev() {
            decoder.push(BlockSpec::upsample(pair[1], pair[0]));
        }
        if let Some(&first) = widths.first() {
            decoder.push(BlockSpec::output(first, input.channels));
        }

        Self {
            input,
            latent_size,
            encoder,
            decoder,
        }
    }

    pub fn depth(&self) -> usize {
        self.encoder.len()
    }

    /// Shapes of every encoder block output, shallow to deep.
    pub fn encoder_shapes(&self) -> AEResult<Vec<ActivationShape>> {
        self.encoder_shapes_for(self.input)
    }

    /// Encoder trace for an arbitrary input shape.
    pub fn encoder_shapes_for(&self, input: ActivationShape) -> AEResult<Vec<ActivationShape>> {
        let mut shapes = Vec::with_capacity(self.encoder.len());
        let mut current = input;
        for spec in &self.encoder {
            current = spec.output_shape(current)?;
            shapes.push(current);
        }
        Ok(shapes)
    }

    /// Shape the latent projection is reshaped into: the deepest encoder
    /// activation.
    pub fn latent_grid(&self) -> AEResult<ActivationShape> {
        self.encoder_shapes()?
            .last()
            .copied()
            .ok_or_else(|| AEError::InvalidConfig("encoder has no blocks".to_string()))
    }

    /// Number of features the encoder flattens into the latent projection.
    pub fn flatten_width(&self) -> AEResult<usize> {
        Ok(self.latent_grid()?.numel())
    }

    /// Decoder activation shapes: the latent grid followed by the outputs of
    /// every block but the last.
    pub fn decoder_shapes(&self) -> AEResult<Vec<ActivationShape>> {
        let mut current = self.latent_grid()?;
        let mut shapes = Vec::with_capacity(self.decoder.len());
        shapes.push(current);
        if let Some((_, hidden)) = self.decoder.split_last() {
            for spec in hidden {
                current = spec.output_shape(current)?;
                shapes.push(current);
            }
        }
        Ok(shapes)
    }

    /// Shape of the reconstructed image.
    pub fn output_shape(&self) -> AEResult<ActivationShape> {
        let mut current = self.latent_grid()?;
        for spec in &self.decoder {
            current = spec.output_shape(current)?;
        }
        Ok(current)
    }

    /// Check that the layout is buildable and that encoder and decoder
    /// activations pair up shape-for-shape.
    ///
    /// # Errors
    /// - `InvalidConfig` describing the first violated constraint
    pub fn validate(&self) -> AEResult<()> {
        if self.encoder.is_empty() {
            return invalid("encoder has no blocks".to_string());
        }
        if self.encoder.len() != self.decoder.len() {
            return invalid(format!(
                "encoder has {} blocks but decoder has {}",
                self.encoder.len(),
                self.decoder.len()
            ));
        }
        if self.latent_size == 0 {
            return invalid("latent size must be positive".to_string());
        }
        if self.input.numel() == 0 {
            return invalid(format!("input shape {} has an empty dimension", self.input));
        }
        if let Some(spec) = self
            .encoder
            .iter()
            .chain(&self.decoder)
            .find(|s| s.channels_out == 0 || s.kernel_size == 0)
        {
            return invalid(format!("degenerate block {spec:?}"));
        }

        let enc = self
            .encoder_shapes()
            .map_err(|e| AEError::InvalidConfig(format!("encoder cannot process {}: {e}", self.input)))?;
        if enc.iter().any(|s| s.numel() == 0) {
            return invalid(format!("encoder collapses {} to an empty map", self.input));
        }
        let dec = self
            .decoder_shapes()
            .map_err(|e| AEError::InvalidConfig(format!("decoder chain is broken: {e}")))?;

        for (i, (e, d)) in enc.iter().zip(dec.iter().rev()).enumerate() {
            if e != d {
                return invalid(format!(
                    "encoder activation {} ({e}) does not mirror decoder activation {} ({d})",
                    i + 1,
                    enc.len() - i
                ));
            }
        }

        let out = self
            .output_shape()
            .map_err(|e| AEError::InvalidConfig(format!("decoder output block is broken: {e}")))?;
        if out != self.input {
            return invalid(format!(
                "decoder reconstructs {out}, expected {}",
                self.input
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_arch() -> Architecture {
        let widths: Vec<usize> = [1, 2, 4, 8, 8].iter().map(|m| m * 128).collect();
        Architecture::mirrored(ActivationShape::new(3, 320, 160), &widths, 1000)
    }

    #[test]
    fn test_default_flatten_width() {
        let arch = default_arch();
        assert_eq!(arch.latent_grid().unwrap(), ActivationShape::new(1024, 10, 5));
        assert_eq!(arch.flatten_width().unwrap(), 51200);
    }

    #[test]
    fn test_decoder_channel_steps() {
        let arch = default_arch();
        let steps: Vec<(usize, usize)> = arch
            .decoder
            .iter()
            .map(|s| (s.channels_in, s.channels_out))
            .collect();
        assert_eq!(
            steps,
            vec![(1024, 1024), (1024, 512), (512, 256), (256, 128), (128, 3)]
        );
        assert_eq!(arch.decoder[4].activation, Nonlinearity::Sigmoid);
        assert!(arch.decoder[4].norm_epsilon.is_none());
        assert!(arch.decoder[..4]
            .iter()
            .all(|s| s.norm_epsilon == Some(DECODER_NORM_EPSILON)));
    }

    #[test]
    fn test_encoder_shapes_halve() {
        let shapes = default_arch().encoder_shapes().unwrap();
        assert_eq!(
            shapes,
            vec![
                ActivationShape::new(128, 160, 80),
                ActivationShape::new(256, 80, 40),
                ActivationShape::new(512, 40, 20),
                ActivationShape::new(1024, 20, 10),
                ActivationShape::new(1024, 10, 5),
            ]
        );
    }

    #[test]
    fn test_mirrored_pairs_match() {
        let arch = default_arch();
        arch.validate().expect("default layout is symmetric");
        let enc = arch.encoder_shapes().unwrap();
        let dec = arch.decoder_shapes().unwrap();
        for k in 0..enc.len() {
            assert_eq!(enc[k], dec[enc.len() - 1 - k]);
        }
        assert_eq!(arch.output_shape().unwrap(), arch.input);
    }

    #[test]
    fn test_validate_rejects_indivisible_input() {
        let arch = Architecture::mirrored(ActivationShape::new(3, 50, 32), &[4, 8, 8], 16);
        assert!(matches!(arch.validate(), Err(AEError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_empty_encoder() {
        let arch = Architecture::mirrored(ActivationShape::new(3, 32, 32), &[], 16);
        assert!(matches!(arch.validate(), Err(AEError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_broken_mirror() {
        let mut arch = Architecture::mirrored(ActivationShape::new(3, 32, 32), &[4, 8], 16);
        arch.decoder[0].channels_out = 6;
        arch.decoder[1].channels_in = 6;
        assert!(matches!(arch.validate(), Err(AEError::InvalidConfig(_))));
    }

    #[test]
    fn test_odd_input_rounds_down_to_same_grid() {
        let widths = [2, 4, 8, 16, 16];
        let arch = Architecture::mirrored(ActivationShape::new(3, 64, 32), &widths, 8);
        let odd = arch
            .encoder_shapes_for(ActivationShape::new(3, 65, 33))
            .unwrap();
        assert_eq!(odd.last().copied().unwrap(), arch.latent_grid().unwrap());
    }

    #[test]
    fn test_output_shape_reports_channel_mismatch() {
        let spec = BlockSpec::downsample(3, 8);
        let err = spec.output_shape(ActivationShape::new(1, 8, 8)).unwrap_err();
        assert!(matches!(err, AEError::ShapeMismatch(_)));
    }
}

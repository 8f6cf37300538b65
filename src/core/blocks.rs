//! Convolutional block shared by the encoder and decoder.
//!
//! A block is fully described by its [`BlockSpec`]; the forward pass runs
//! the optional stages in a fixed order:
//!
//! ```text
//! upsample (nearest) -> replication pad -> conv -> batch norm -> nonlinearity
//! ```

use burn::module::Ignored;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

use super::architecture::{BlockSpec, Nonlinearity, Padding};

/// One encoder or decoder stage holding its convolution and optional norm.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: Option<BatchNorm<B, 2>>,
    spec: Ignored<BlockSpec>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(spec: &BlockSpec, device: &B::Device) -> Self {
        let conv_padding = match spec.padding {
            Padding::Zero(p) => p,
            Padding::Replicate(_) => 0,
        };
        let conv = Conv2dConfig::new(
            [spec.channels_in, spec.channels_out],
            [spec.kernel_size, spec.kernel_size],
        )
        .with_stride([spec.stride, spec.stride])
        .with_padding(PaddingConfig2d::Explicit(conv_padding, conv_padding))
        .init(device);

        let norm = spec.norm_epsilon.map(|epsilon| {
            BatchNormConfig::new(spec.channels_out)
                .with_epsilon(epsilon)
                .init(device)
        });

        Self {
            conv,
            norm,
            spec: Ignored(spec.clone()),
        }
    }

    pub fn spec(&self) -> &BlockSpec {
        &self.spec.0
    }

    /// # Shapes
    ///   - input `[batch, channels_in, height, width]`
    ///   - output `[batch, channels_out, height', width']` per
    ///     [`BlockSpec::output_shape`]
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let spec = self.spec();
        let mut x = input;

        if let Some(scale) = spec.upsample {
            x = upsample_nearest(x, scale);
        }
        if let Padding::Replicate(p) = spec.padding {
            x = replication_pad(x, p);
        }

        x = self.conv.forward(x);
        if let Some(norm) = &self.norm {
            x = norm.forward(x);
        }

        match spec.activation {
            Nonlinearity::LeakyRelu(slope) => activation::leaky_relu(x, slope),
            Nonlinearity::Relu => activation::relu(x),
            Nonlinearity::Sigmoid => activation::sigmoid(x),
        }
    }
}

/// Nearest-neighbour upsampling of both spatial dimensions by `scale`.
pub fn upsample_nearest<B: Backend>(x: Tensor<B, 4>, scale: usize) -> Tensor<B, 4> {
    if scale == 1 {
        return x;
    }
    let [_, _, height, width] = x.dims();
    interpolate(
        x,
        [height * scale, width * scale],
        InterpolateOptions::new(InterpolateMode::Nearest),
    )
}

/// Pad the two spatial dimensions by repeating the border rows and columns
/// `pad` times on every side.
pub fn replication_pad<B: Backend>(x: Tensor<B, 4>, pad: usize) -> Tensor<B, 4> {
    if pad == 0 {
        return x;
    }
    let x = pad_edges(x, 2, pad);
    pad_edges(x, 3, pad)
}

fn pad_edges<B: Backend>(x: Tensor<B, 4>, dim: usize, pad: usize) -> Tensor<B, 4> {
    let dims = x.dims();
    let edge = |index: usize| {
        let mut ranges = dims.map(|d| 0..d);
        ranges[dim] = index..index + 1;
        x.clone().slice(ranges)
    };
    let first = edge(0);
    let last = edge(dims[dim] - 1);

    let mut parts = Vec::with_capacity(2 * pad + 1);
    parts.extend(std::iter::repeat(first).take(pad));
    parts.push(x.clone());
    parts.extend(std::iter::repeat(last).take(pad));
    Tensor::cat(parts, dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn test_device() -> <TestBackend as Backend>::Device {
        Default::default()
    }

    fn grid(values: Vec<f32>, height: usize, width: usize) -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(values, [1, 1, height, width]), &test_device())
    }

    fn to_vec(t: Tensor<TestBackend, 4>) -> Vec<f32> {
        t.into_data().to_vec().expect("tensor to vec")
    }

    #[test]
    fn test_replication_pad_repeats_edges() {
        let x = grid(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        let padded = replication_pad(x, 1);
        assert_eq!(padded.dims(), [1, 1, 4, 5]);
        #[rustfmt::skip]
        let expected = vec![
            1.0, 1.0, 2.0, 3.0, 3.0,
            1.0, 1.0, 2.0, 3.0, 3.0,
            4.0, 4.0, 5.0, 6.0, 6.0,
            4.0, 4.0, 5.0, 6.0, 6.0,
        ];
        assert_eq!(to_vec(padded), expected);
    }

    #[test]
    fn test_upsample_nearest_doubles() {
        let x = grid(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let up = upsample_nearest(x, 2);
        assert_eq!(up.dims(), [1, 1, 4, 4]);
        #[rustfmt::skip]
        let expected = vec![
            1.0, 1.0, 2.0, 2.0,
            1.0, 1.0, 2.0, 2.0,
            3.0, 3.0, 4.0, 4.0,
            3.0, 3.0, 4.0, 4.0,
        ];
        assert_eq!(to_vec(up), expected);
    }

    #[test]
    fn test_downsample_block_halves() {
        let device = test_device();
        let block = ConvBlock::<TestBackend>::new(&BlockSpec::downsample(3, 4), &device);
        let x = Tensor::<TestBackend, 4>::ones([2, 3, 16, 8], &device);
        assert_eq!(block.forward(x).dims(), [2, 4, 8, 4]);
    }

    #[test]
    fn test_output_block_is_bounded() {
        let device = test_device();
        let block = ConvBlock::<TestBackend>::new(&BlockSpec::output(4, 3), &device);
        let x = Tensor::<TestBackend, 4>::random(
            [1, 4, 4, 2],
            burn::tensor::Distribution::Normal(0.0, 10.0),
            &device,
        );
        let out = block.forward(x);
        assert_eq!(out.dims(), [1, 3, 8, 4]);
        assert!(to_vec(out).iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

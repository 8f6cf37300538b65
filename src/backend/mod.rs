//! Backend aliases and device selection.
//!
//! Nothing in the crate assumes a global device: callers pick a backend and
//! pass its device into [`AutoEncoderConfig::init`](crate::AutoEncoderConfig::init)
//! and every tensor they feed the model. The CPU backend is always available;
//! the `wgpu` feature adds a cross-platform GPU backend (Vulkan, Metal, DX12).

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};

/// CPU backend for inference and tests.
pub type CpuBackend = NdArray<f32>;

/// CPU backend with gradient tracking, for [`train_step`](crate::train_step).
pub type TrainingBackend = Autodiff<CpuBackend>;

pub fn cpu_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

#[cfg(feature = "wgpu")]
pub use gpu::*;

#[cfg(feature = "wgpu")]
mod gpu {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};
    use burn::backend::Autodiff;

    pub type WgpuBackend = Wgpu;

    pub type WgpuTrainingBackend = Autodiff<WgpuBackend>;

    /// Initialize the wgpu device (auto-detect best GPU).
    pub fn wgpu_device() -> WgpuDevice {
        WgpuDevice::default()
    }
}

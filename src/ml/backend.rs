// ============================================================
// Layer 5 — Backend Aliases
// ============================================================
// Training always needs autodiff. The GPU path uses WGPU; the
// CPU path uses ndarray, which is also what the tests run on.
// Evaluation happens on `B::InnerBackend` after `model.valid()`.

use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu};

pub type GpuBackend = Autodiff<Wgpu>;
pub type CpuBackend = Autodiff<NdArray>;

pub fn gpu_device() -> WgpuDevice {
    WgpuDevice::default()
}

pub fn cpu_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

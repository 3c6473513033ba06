// ============================================================
// Layer 5 — Backend and Device Selection
// ============================================================
// One place decides which burn backend the binary runs on.
//
//   default build        → NdArray (CPU)
//   --features wgpu      → Wgpu, device picked by --gpu-id
//
// Training wraps the inference backend in Autodiff; validation
// and analysis run on the inner backend directly via
// `model.valid()`, so no gradient graph is built for them.
//
// The device is chosen once at startup and never changes.

use burn::backend::Autodiff;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

pub type TrainBackend = Autodiff<InferBackend>;

pub type Device = <InferBackend as burn::tensor::backend::Backend>::Device;

/// Resolve `--gpu-id` to a device of the compiled backend.
#[cfg(feature = "wgpu")]
pub fn select_device(gpu_id: usize) -> Device {
    let device = burn::backend::wgpu::WgpuDevice::DiscreteGpu(gpu_id);
    tracing::info!("Using WGPU device: {:?}", device);
    device
}

/// Resolve `--gpu-id` to a device of the compiled backend.
#[cfg(not(feature = "wgpu"))]
pub fn select_device(gpu_id: usize) -> Device {
    if gpu_id != 0 {
        tracing::warn!("gpu_id={} ignored: built without the `wgpu` feature, running on CPU", gpu_id);
    }
    let device = burn::backend::ndarray::NdArrayDevice::Cpu;
    tracing::info!("Using NdArray device: {:?}", device);
    device
}

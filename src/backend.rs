//! Backend abstraction - CPU inference backend
//!
//! The deep tier runs on the NdArray backend; diagnosis requests are served
//! one image at a time, so there is no batching to amortize a GPU transfer.

use burn::tensor::backend::Backend;

#[cfg(feature = "ndarray")]
pub type DefaultBackend = burn_ndarray::NdArray;

#[cfg(not(feature = "ndarray"))]
compile_error!("The ndarray backend feature must be enabled!");

/// Get the default device
pub fn default_device() -> <DefaultBackend as Backend>::Device {
    <DefaultBackend as Backend>::Device::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    "NdArray (CPU)"
}

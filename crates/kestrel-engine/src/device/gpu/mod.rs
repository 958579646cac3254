//! wgpu device backend.
//!
//! Owns the wgpu Instance/Adapter/Device/Queue and the window surface, and
//! maps device commands onto native textures, samplers and buffers.

mod backend;
mod convert;
mod init;
mod pipeline;
mod surface;

pub use backend::WgpuBackend;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;

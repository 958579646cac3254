//! Device layer: resource ids, the ordered command queue and the device thread.
//!
//! Front-end handles (textures, buffers, mesh buffers) live on the application
//! thread and only hold an id plus a cached copy of their logical state. Every
//! mutation becomes a [`DeviceCommand`] on the device's FIFO; the
//! [`DeviceWorker`](worker::DeviceWorker) owns the back-end tables and applies
//! commands in submission order through a [`DeviceBackend`].
//!
//! Failures on the device thread are logged and counted in [`DeviceStats`].
//! They never propagate back to the caller that queued the command.

mod backend;
pub mod command;
mod error;
pub mod gpu;
mod id;
mod queue;
mod resource;
pub(crate) mod worker;

pub use backend::{BackendOp, DeviceBackend, HeadlessBackend, HeadlessProbe};
pub use command::{DeviceCommand, DeviceTask, DrawCall, PipelineState, PrimitiveTopology};
pub use error::{DeviceError, DeviceResult};
pub use id::{BufferId, DeviceId, MeshBufferId, ResourceId, ResourceKey, TextureId};
pub use queue::{DeviceStats, RenderDevice};
pub(crate) use queue::CommandReceiver;

//! Kestrel engine core.
//!
//! Rendering and resource layer of a real-time engine:
//! - [`graphics`]: texture, buffer and mesh buffer handles that cache their
//!   state on the application thread and forward changes to the device
//! - [`device`]: ids, the ordered command queue, the device thread and its
//!   back-ends (headless recorder, wgpu)
//! - [`window`]: the window cache, platform back-ends and the winit runtime
//! - [`scene`]: actors, components and layers, draw dispatch and hit testing
//! - [`core`]: the explicit [`Engine`](core::Engine) context and task queues

pub mod coords;
pub mod core;
pub mod device;
pub mod error;
pub mod events;
pub mod graphics;
pub mod logging;
pub mod paint;
pub mod scene;
pub mod window;

pub use error::{Error, Result};

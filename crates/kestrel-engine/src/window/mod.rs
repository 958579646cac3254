//! Window cache, platform back-ends and the native runtime loop.
//!
//! A [`Window`] answers getters from its cache and pushes platform calls onto
//! the main-thread queue. The platform half is a [`WindowBackend`] picked once
//! at startup ([`WindowBackendKind`]); it reports changes back through a
//! [`WindowListener`].

mod backend;
mod handle;
mod headless;
pub mod runtime;
mod winit_backend;

pub use backend::{WindowBackend, WindowBackendKind, WindowConfig, WindowListener, create_window_backend};
pub use handle::{Window, WindowContext};
pub use headless::{HeadlessWindow, HeadlessWindowProbe, WindowOp};
pub use runtime::{App, AppControl, Runtime, RuntimeConfig};
pub use winit_backend::WinitWindow;

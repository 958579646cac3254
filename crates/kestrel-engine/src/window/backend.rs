use std::sync::Arc;

use crate::coords::Size2;
use crate::error::{Error, Result};

use super::headless::HeadlessWindow;
use super::winit_backend::WinitWindow;

/// Window creation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Logical size.
    pub size: Size2,
    pub resizable: bool,
    pub fullscreen: bool,
    /// Take over the display mode instead of a borderless fullscreen window.
    pub exclusive_fullscreen: bool,
    pub title: String,
    pub high_dpi: bool,
    /// Request a depth buffer for the back buffer.
    pub depth: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: Size2::new(1280.0, 720.0),
            resizable: true,
            fullscreen: false,
            exclusive_fullscreen: false,
            title: "kestrel".to_string(),
            high_dpi: true,
            depth: false,
        }
    }
}

/// Platform back-end variants. Chosen once at startup.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum WindowBackendKind {
    /// No native window; sizes are simulated.
    Headless,
    /// Native window through winit.
    Winit,
}

impl WindowBackendKind {
    /// `KESTREL_HEADLESS` (any value except empty or `0`) forces headless.
    /// On Linux a missing `DISPLAY`/`WAYLAND_DISPLAY` also selects headless.
    pub fn detect() -> Self {
        let forced = std::env::var("KESTREL_HEADLESS").is_ok_and(|v| !v.is_empty() && v != "0");
        if forced {
            return Self::Headless;
        }

        let no_display = cfg!(target_os = "linux")
            && std::env::var_os("DISPLAY").is_none()
            && std::env::var_os("WAYLAND_DISPLAY").is_none();
        if no_display { Self::Headless } else { Self::Winit }
    }
}

/// Notifications a platform back-end delivers about its window.
///
/// Implementations must be cheap and must not call back into the back-end.
pub trait WindowListener: Send + Sync {
    fn on_size_change(&self, size: Size2);
    fn on_resolution_change(&self, resolution: Size2);
    fn on_fullscreen_change(&self, fullscreen: bool);
    fn on_screen_change(&self, display_id: u32);
    fn on_close(&self);
}

/// Platform half of a [`super::Window`]. Owned exclusively by the window and
/// driven from the main-thread queue.
pub trait WindowBackend: Send {
    fn kind(&self) -> WindowBackendKind;

    fn init(&mut self, config: &WindowConfig) -> Result<()>;

    /// Logical size.
    fn size(&self) -> Size2;

    /// Drawable size in physical pixels.
    fn resolution(&self) -> Size2;

    fn set_size(&mut self, size: Size2);
    fn set_fullscreen(&mut self, fullscreen: bool);
    fn set_title(&mut self, title: &str);
    fn close(&mut self);

    fn set_listener(&mut self, listener: Option<Arc<dyn WindowListener>>);

    /// Translates a native window event into listener notifications.
    fn handle_native_event(&mut self, event: &winit::event::WindowEvent) {
        let _ = event;
    }
}

/// Builds the back-end for `kind`. The winit variant wraps an already created
/// native window.
pub fn create_window_backend(
    kind: WindowBackendKind,
    native: Option<Arc<winit::window::Window>>,
) -> Result<Box<dyn WindowBackend>> {
    match kind {
        WindowBackendKind::Headless => Ok(Box::new(HeadlessWindow::new())),
        WindowBackendKind::Winit => {
            let window = native.ok_or_else(|| Error::Platform("winit back-end needs a native window".to_string()))?;
            Ok(Box::new(WinitWindow::new(window)))
        }
    }
}

use std::sync::Arc;

use parking_lot::Mutex;

use crate::coords::Size2;
use crate::error::{Error, Result};

use super::{WindowBackend, WindowBackendKind, WindowConfig, WindowListener};

/// Platform call observed by [`HeadlessWindow`].
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOp {
    Init(WindowConfig),
    SetSize(Size2),
    SetFullscreen(bool),
    SetTitle(String),
    Close,
}

/// Test and server hook into a [`HeadlessWindow`]: inspects platform calls and
/// fires notifications as a native window system would.
#[derive(Clone, Default)]
pub struct HeadlessWindowProbe {
    inner: Arc<ProbeInner>,
}

#[derive(Default)]
struct ProbeInner {
    ops: Mutex<Vec<WindowOp>>,
    listener: Mutex<Option<Arc<dyn WindowListener>>>,
}

impl HeadlessWindowProbe {
    pub fn ops(&self) -> Vec<WindowOp> {
        self.inner.ops.lock().clone()
    }

    pub fn has_listener(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    pub fn notify_size_change(&self, size: Size2) {
        self.with_listener(|l| l.on_size_change(size));
    }

    pub fn notify_resolution_change(&self, resolution: Size2) {
        self.with_listener(|l| l.on_resolution_change(resolution));
    }

    pub fn notify_fullscreen_change(&self, fullscreen: bool) {
        self.with_listener(|l| l.on_fullscreen_change(fullscreen));
    }

    pub fn notify_screen_change(&self, display_id: u32) {
        self.with_listener(|l| l.on_screen_change(display_id));
    }

    pub fn notify_close(&self) {
        self.with_listener(|l| l.on_close());
    }

    fn record(&self, op: WindowOp) {
        self.inner.ops.lock().push(op);
    }

    fn with_listener(&self, f: impl FnOnce(&dyn WindowListener)) {
        let listener = self.inner.listener.lock().clone();
        if let Some(listener) = listener {
            f(listener.as_ref());
        }
    }
}

impl std::fmt::Debug for HeadlessWindowProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessWindowProbe")
            .field("ops", &self.inner.ops.lock().len())
            .field("listener", &self.has_listener())
            .finish()
    }
}

/// Window back-end without a window system.
///
/// Resolution equals the logical size (scale factor 1). Size changes are
/// reported back through the listener like a native window would.
#[derive(Debug, Default)]
pub struct HeadlessWindow {
    size: Size2,
    title: String,
    fullscreen: bool,
    probe: HeadlessWindowProbe,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> HeadlessWindowProbe {
        self.probe.clone()
    }
}

impl WindowBackend for HeadlessWindow {
    fn kind(&self) -> WindowBackendKind {
        WindowBackendKind::Headless
    }

    fn init(&mut self, config: &WindowConfig) -> Result<()> {
        if config.size.is_empty() {
            return Err(Error::Platform(format!(
                "cannot create a {}x{} window",
                config.size.width, config.size.height
            )));
        }

        self.size = config.size;
        self.title = config.title.clone();
        self.fullscreen = config.fullscreen;
        self.probe.record(WindowOp::Init(config.clone()));
        log::debug!("headless window \"{}\" {}x{}", self.title, self.size.width, self.size.height);
        Ok(())
    }

    fn size(&self) -> Size2 {
        self.size
    }

    fn resolution(&self) -> Size2 {
        self.size
    }

    fn set_size(&mut self, size: Size2) {
        self.probe.record(WindowOp::SetSize(size));
        if self.size != size {
            self.size = size;
            self.probe.notify_resolution_change(size);
        }
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
        self.probe.record(WindowOp::SetFullscreen(fullscreen));
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.probe.record(WindowOp::SetTitle(title.to_string()));
    }

    fn close(&mut self) {
        self.probe.record(WindowOp::Close);
        self.probe.notify_close();
    }

    fn set_listener(&mut self, listener: Option<Arc<dyn WindowListener>>) {
        *self.probe.inner.listener.lock() = listener;
    }
}

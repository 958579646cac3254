use std::sync::Arc;

use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::window::{Fullscreen, Window as NativeWindow};

use crate::coords::Size2;
use crate::error::Result;

use super::{WindowBackend, WindowBackendKind, WindowConfig, WindowListener};

/// Window back-end over a winit window created by the runtime.
///
/// All calls arrive on the main thread through the window's main queue.
pub struct WinitWindow {
    window: Arc<NativeWindow>,
    listener: Option<Arc<dyn WindowListener>>,
    high_dpi: bool,
    exclusive_fullscreen: bool,
    size: Size2,
    resolution: Size2,
    fullscreen: bool,
    display_id: u32,
}

impl WinitWindow {
    pub fn new(window: Arc<NativeWindow>) -> Self {
        Self {
            window,
            listener: None,
            high_dpi: true,
            exclusive_fullscreen: false,
            size: Size2::zero(),
            resolution: Size2::zero(),
            fullscreen: false,
            display_id: 0,
        }
    }

    pub fn native(&self) -> &Arc<NativeWindow> {
        &self.window
    }

    fn scale_factor(&self) -> f64 {
        if self.high_dpi { self.window.scale_factor() } else { 1.0 }
    }

    fn measure(&self) -> (Size2, Size2) {
        window_sizes(self.window.inner_size(), self.window.scale_factor(), self.high_dpi)
    }

    /// Caches `size` and `resolution`, reporting the ones that changed.
    fn apply_sizes(&mut self, size: Size2, resolution: Size2) {
        let listener = self.listener.clone();
        if size != self.size {
            self.size = size;
            if let Some(listener) = &listener {
                listener.on_size_change(size);
            }
        }
        if resolution != self.resolution {
            self.resolution = resolution;
            if let Some(listener) = &listener {
                listener.on_resolution_change(resolution);
            }
        }
    }

    fn current_display(&self) -> u32 {
        let Some(current) = self.window.current_monitor() else {
            return 0;
        };
        self.window
            .available_monitors()
            .position(|m| m == current)
            .map_or(0, |i| i as u32)
    }

    fn fullscreen_mode(&self, fullscreen: bool) -> Option<Fullscreen> {
        if !fullscreen {
            return None;
        }
        if self.exclusive_fullscreen {
            let mode = self
                .window
                .current_monitor()
                .and_then(|m| m.video_modes().next());
            if let Some(mode) = mode {
                return Some(Fullscreen::Exclusive(mode));
            }
            log::warn!("no exclusive video mode available; using borderless fullscreen");
        }
        Some(Fullscreen::Borderless(None))
    }

    /// Re-reads the native window and reports what changed.
    fn refresh(&mut self) {
        let (size, resolution) = self.measure();
        let fullscreen = self.window.fullscreen().is_some();
        let display_id = self.current_display();

        self.apply_sizes(size, resolution);

        let Some(listener) = self.listener.clone() else {
            self.fullscreen = fullscreen;
            self.display_id = display_id;
            return;
        };

        if fullscreen != self.fullscreen {
            self.fullscreen = fullscreen;
            listener.on_fullscreen_change(fullscreen);
        }
        if display_id != self.display_id {
            self.display_id = display_id;
            listener.on_screen_change(display_id);
        }
    }
}

impl WindowBackend for WinitWindow {
    fn kind(&self) -> WindowBackendKind {
        WindowBackendKind::Winit
    }

    fn init(&mut self, config: &WindowConfig) -> Result<()> {
        self.high_dpi = config.high_dpi;
        self.exclusive_fullscreen = config.exclusive_fullscreen;

        self.window.set_title(&config.title);
        self.window.set_resizable(config.resizable);
        let applied = self
            .window
            .request_inner_size(LogicalSize::new(config.size.width, config.size.height));
        self.window.set_fullscreen(self.fullscreen_mode(config.fullscreen));
        self.fullscreen = config.fullscreen;
        self.display_id = self.current_display();

        // `None` means the size arrives later as a `Resized` event.
        let (size, resolution) = match applied {
            Some(physical) => window_sizes(physical, self.window.scale_factor(), self.high_dpi),
            None => self.measure(),
        };
        self.apply_sizes(size, resolution);

        log::info!(
            "window \"{}\" {}x{} (scale {:.2}, depth {})",
            config.title,
            size.width,
            size.height,
            self.scale_factor(),
            config.depth
        );
        Ok(())
    }

    fn size(&self) -> Size2 {
        self.size
    }

    fn resolution(&self) -> Size2 {
        self.resolution
    }

    fn set_size(&mut self, size: Size2) {
        if let Some(physical) = self
            .window
            .request_inner_size(LogicalSize::new(size.width, size.height))
        {
            log::trace!("resize applied immediately: {}x{}", physical.width, physical.height);
            self.refresh();
        }
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        self.window.set_fullscreen(self.fullscreen_mode(fullscreen));
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    fn close(&mut self) {
        // winit windows close by being dropped; the runtime does that on exit.
        if let Some(listener) = &self.listener {
            listener.on_close();
        }
    }

    fn set_listener(&mut self, listener: Option<Arc<dyn WindowListener>>) {
        self.listener = listener;
    }

    fn handle_native_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } | WindowEvent::Moved(_) => {
                self.refresh();
            }
            WindowEvent::CloseRequested => {
                if let Some(listener) = &self.listener {
                    listener.on_close();
                }
            }
            _ => {}
        }
    }
}

/// Logical size and back-buffer resolution of a `physical` client area.
/// Without high-DPI the resolution stays at the logical size.
fn window_sizes(physical: PhysicalSize<u32>, scale_factor: f64, high_dpi: bool) -> (Size2, Size2) {
    let logical = physical.to_logical::<f32>(scale_factor);
    let size = Size2::new(logical.width, logical.height);
    let resolution = if high_dpi {
        Size2::new(physical.width as f32, physical.height as f32)
    } else {
        size
    };
    (size, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_dpi_resolution_is_physical() {
        let (size, resolution) = window_sizes(PhysicalSize::new(1600, 1200), 2.0, true);
        assert_eq!(size, Size2::new(800.0, 600.0));
        assert_eq!(resolution, Size2::new(1600.0, 1200.0));
    }

    #[test]
    fn low_dpi_resolution_matches_size() {
        let (size, resolution) = window_sizes(PhysicalSize::new(1600, 1200), 2.0, false);
        assert_eq!(size, Size2::new(800.0, 600.0));
        assert_eq!(resolution, size);
    }
}

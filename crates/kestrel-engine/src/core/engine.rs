use std::sync::Arc;

use crate::coords::{Rect, Size2, Vec2};
use crate::device::{DeviceBackend, HeadlessBackend, HeadlessProbe, RenderDevice};
use crate::error::Result;
use crate::events::EventDispatcher;
use crate::graphics::{Renderer, RendererConfig};
use crate::scene::{DrawContext, DrawList, Scene};
use crate::window::{
    HeadlessWindow, HeadlessWindowProbe, Window, WindowBackend, WindowBackendKind, WindowConfig, WindowContext,
    create_window_backend,
};

use super::{ExitSignal, TaskQueue};

/// Startup configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    /// `None` picks the back-end with [`WindowBackendKind::detect`].
    pub platform: Option<WindowBackendKind>,
}

/// Inspection hooks of an engine started with [`Engine::headless`].
#[derive(Debug, Clone)]
pub struct HeadlessProbes {
    pub device: HeadlessProbe,
    pub window: HeadlessWindowProbe,
}

/// Explicit engine context: window, renderer, task queues, events and the
/// exit signal. Nothing here is global; tests can run several engines side
/// by side.
pub struct Engine {
    // Field order is drop order: the window detaches before the device stops.
    window: Window,
    renderer: Renderer,
    main_queue: TaskQueue,
    update_queue: TaskQueue,
    events: EventDispatcher,
    exit: ExitSignal,
    draw_list: DrawList,
    frames: u64,
}

impl Engine {
    /// Starts on the configured (or detected) platform. `native` is required
    /// for [`WindowBackendKind::Winit`].
    pub fn new(
        config: EngineConfig,
        native: Option<Arc<winit::window::Window>>,
        device_backend: Box<dyn DeviceBackend>,
    ) -> Result<Self> {
        let kind = config.platform.unwrap_or_else(WindowBackendKind::detect);
        let window_backend = create_window_backend(kind, native)?;
        Self::with_backends(config, window_backend, device_backend)
    }

    /// Starts with a headless window and the recording device back-end.
    pub fn headless(config: EngineConfig) -> Result<(Self, HeadlessProbes)> {
        let window = HeadlessWindow::new();
        let device = HeadlessBackend::new();
        let probes = HeadlessProbes { device: device.probe(), window: window.probe() };
        let engine = Self::with_backends(config, Box::new(window), Box::new(device))?;
        Ok((engine, probes))
    }

    pub fn with_backends(
        config: EngineConfig,
        window_backend: Box<dyn WindowBackend>,
        device_backend: Box<dyn DeviceBackend>,
    ) -> Result<Self> {
        let renderer = Renderer::new(config.renderer, device_backend)?;
        let main_queue = TaskQueue::new("main");
        let update_queue = TaskQueue::new("update");
        let events = EventDispatcher::new();
        let exit = ExitSignal::default();

        let mut window = Window::new(
            window_backend,
            WindowContext {
                main_queue: main_queue.clone(),
                update_queue: update_queue.clone(),
                events: events.clone(),
                device: renderer.device().clone(),
                exit: exit.clone(),
            },
        );
        window.init(&config.window)?;
        renderer.set_size(window.resolution());

        log::info!(
            "engine started: {:?} window {}x{}",
            window.backend_kind(),
            window.size().width,
            window.size().height
        );

        Ok(Self {
            window,
            renderer,
            main_queue,
            update_queue,
            events,
            exit,
            draw_list: DrawList::new(),
            frames: 0,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Device handle for creating textures, buffers and mesh buffers.
    pub fn device(&self) -> &RenderDevice {
        self.renderer.device()
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn main_queue(&self) -> &TaskQueue {
        &self.main_queue
    }

    pub fn update_queue(&self) -> &TaskQueue {
        &self.update_queue
    }

    pub fn exit_signal(&self) -> &ExitSignal {
        &self.exit
    }

    pub fn exit(&self) {
        self.exit.raise();
    }

    pub fn should_exit(&self) -> bool {
        self.exit.is_raised()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// One tick of the application loop: platform tasks, then inbound
    /// notifications, then event handlers. Call from the main thread.
    /// Returns `false` once exit was requested.
    pub fn update(&mut self) -> bool {
        self.main_queue.run_pending();
        self.update_queue.run_pending();
        self.events.dispatch_events();
        !self.exit.is_raised()
    }

    /// Draws `scene` into the back buffer and queues a present. In manual
    /// renderer mode the device queue is drained before returning.
    pub fn render_frame(&mut self, scene: &mut Scene) -> usize {
        let resolution = self.renderer.size();
        let base = DrawContext {
            viewport: Rect::from_origin_size(Vec2::ZERO, Vec2::new(resolution.width, resolution.height)),
            depth_test: self.renderer.config().depth,
            depth_write: self.renderer.config().depth,
            ..DrawContext::default()
        };

        self.draw_list.clear();
        scene.draw(&base, &mut self.draw_list);
        let submitted = self.renderer.submit_frame(&mut self.draw_list);
        self.renderer.process_commands();

        self.frames += 1;
        log::trace!("frame {} submitted {submitted} draw call(s)", self.frames);
        submitted
    }

    /// Back-buffer size in physical pixels.
    pub fn resolution(&self) -> Size2 {
        self.renderer.size()
    }

    /// Stops the device thread after everything already queued.
    pub fn shutdown(&mut self) {
        self.renderer.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("window", &self.window)
            .field("renderer", &self.renderer)
            .field("frames", &self.frames)
            .finish()
    }
}

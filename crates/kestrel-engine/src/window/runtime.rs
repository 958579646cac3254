use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window as NativeWindow, WindowId};

use crate::core::{Engine, EngineConfig};
use crate::device::gpu::{GpuInit, WgpuBackend};
use crate::scene::Scene;

use super::WindowBackendKind;

/// Native runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub gpu: GpuInit,
}

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by [`Runtime::run`].
pub trait App {
    /// Called once the engine is up, before the first frame.
    fn init(&mut self, engine: &mut Engine, scene: &mut Scene) -> Result<()>;

    /// Called before each frame is drawn.
    fn update(&mut self, engine: &mut Engine, scene: &mut Scene) -> AppControl {
        let _ = (engine, scene);
        AppControl::Continue
    }
}

/// Entry point for native applications.
pub struct Runtime;

impl Runtime {
    /// Runs the winit event loop until the engine's exit signal is raised.
    /// Startup failures end the loop and are returned here.
    pub fn run<A>(config: RuntimeConfig, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState { config: Some(config), app, running: None, error: None };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct Running {
    // Dropped before the native window it renders into.
    engine: Engine,
    scene: Scene,
    native: Arc<NativeWindow>,
}

struct AppState<A> {
    config: Option<RuntimeConfig>,
    app: A,
    running: Option<Running>,
    error: Option<anyhow::Error>,
}

impl<A: App> AppState<A> {
    fn start(&mut self, event_loop: &ActiveEventLoop, config: RuntimeConfig) -> Result<Running> {
        let window = &config.engine.window;
        let attrs = NativeWindow::default_attributes()
            .with_title(window.title.clone())
            .with_inner_size(LogicalSize::new(window.size.width, window.size.height))
            .with_resizable(window.resizable);

        let native = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);

        let gpu_init = config.gpu.with_vsync(config.engine.renderer.vsync);
        let gpu = pollster::block_on(WgpuBackend::new(Arc::clone(&native), gpu_init))
            .context("GPU initialization failed")?;

        let engine_config = EngineConfig { platform: Some(WindowBackendKind::Winit), ..config.engine };
        let mut engine = Engine::new(engine_config, Some(Arc::clone(&native)), Box::new(gpu))
            .context("engine startup failed")?;

        let mut scene = Scene::new();
        self.app
            .init(&mut engine, &mut scene)
            .context("application init failed")?;

        native.request_redraw();
        Ok(Running { engine, scene, native })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl<A: App> ApplicationHandler for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else {
            return;
        };

        match self.start(event_loop, config) {
            Ok(running) => self.running = Some(running),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = &self.running else {
            return;
        };
        if running.engine.should_exit() {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);
        running.native.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(running) = &mut self.running else {
            return;
        };
        if running.native.id() != window_id {
            return;
        }

        running.engine.window().handle_native_event(&event);

        if matches!(event, WindowEvent::RedrawRequested) {
            running.engine.update();
            if self.app.update(&mut running.engine, &mut running.scene) == AppControl::Exit {
                running.engine.exit();
            }
            running.engine.render_frame(&mut running.scene);
        }

        if running.engine.should_exit() {
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut running) = self.running.take() {
            running.engine.shutdown();
            log::info!("runtime stopped after {} frame(s)", running.engine.frame_count());
        }
    }
}

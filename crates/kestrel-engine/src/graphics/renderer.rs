use std::thread::JoinHandle;

use crate::coords::Size2;
use crate::device::command::DeviceCommand;
use crate::device::worker::{DeviceWorker, Flow};
use crate::device::{DeviceBackend, DeviceStats, RenderDevice};
use crate::error::Result;
use crate::paint::Color;
use crate::scene::DrawList;

use super::{ClearState, SamplerDefaults, SamplerFilter};

/// Where device commands are executed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum RendererMode {
    /// Dedicated device thread.
    #[default]
    Threaded,
    /// Commands run when [`Renderer::process_commands`] is called.
    Manual,
}

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub mode: RendererMode,
    /// Back-buffer clear state.
    pub clear: ClearState,
    /// Filter of textures left at [`SamplerFilter::Default`].
    pub texture_filter: SamplerFilter,
    /// Anisotropy of textures whose own value is 0.
    pub max_anisotropy: u32,
    pub vsync: bool,
    pub depth: bool,
}

impl RendererConfig {
    pub fn sampler_defaults(&self) -> SamplerDefaults {
        let filter = match self.texture_filter {
            SamplerFilter::Default => SamplerDefaults::default().filter,
            filter => filter,
        };
        SamplerDefaults { filter, max_anisotropy: self.max_anisotropy.max(1) }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: RendererMode::Threaded,
            clear: ClearState::default(),
            texture_filter: SamplerFilter::Linear,
            max_anisotropy: 1,
            vsync: true,
            depth: false,
        }
    }
}

enum Executor {
    Threaded(JoinHandle<()>),
    Manual(Box<DeviceWorker>),
    Stopped,
}

/// Owns the device queue and its executor; submits frames.
pub struct Renderer {
    device: RenderDevice,
    executor: Executor,
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig, backend: Box<dyn DeviceBackend>) -> Result<Self> {
        let backend_name = backend.name();
        let (device, receiver) = RenderDevice::new();
        let worker = DeviceWorker::new(backend, receiver);

        let executor = match config.mode {
            RendererMode::Threaded => Executor::Threaded(worker.spawn()?),
            RendererMode::Manual => Executor::Manual(Box::new(worker)),
        };

        device.submit(DeviceCommand::SetFrameClear(config.clear));
        device.submit(DeviceCommand::SetSamplerDefaults(config.sampler_defaults()));
        log::info!("renderer started: device {} on {backend_name} ({:?})", device.id(), config.mode);

        Ok(Self { device, executor, config })
    }

    /// Handle used to create textures, buffers and mesh buffers.
    #[inline]
    pub fn device(&self) -> &RenderDevice {
        &self.device
    }

    pub fn mode(&self) -> RendererMode {
        self.config.mode
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Back-buffer size in physical pixels.
    pub fn size(&self) -> Size2 {
        self.device.size()
    }

    pub fn set_size(&self, size: Size2) {
        self.device.set_size(size);
    }

    pub fn clear_state(&self) -> ClearState {
        self.config.clear
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.update_clear(|c| c.color = color);
    }

    pub fn set_clear_color_buffer(&mut self, clear: bool) {
        self.update_clear(|c| c.color_buffer = clear);
    }

    pub fn set_clear_depth(&mut self, depth: f32) {
        self.update_clear(|c| c.depth = depth);
    }

    pub fn set_clear_depth_buffer(&mut self, clear: bool) {
        self.update_clear(|c| c.depth_buffer = clear);
    }

    fn update_clear(&mut self, f: impl FnOnce(&mut ClearState)) {
        let mut clear = self.config.clear;
        f(&mut clear);
        if clear != self.config.clear {
            self.config.clear = clear;
            self.device.submit(DeviceCommand::SetFrameClear(clear));
        }
    }

    /// Runs `task` on the device thread after everything queued so far.
    pub fn execute_on_render_thread<F>(&self, task: F)
    where
        F: FnOnce(&mut dyn DeviceBackend) + Send + 'static,
    {
        self.device.execute(task);
    }

    /// Queues the draw calls of `list` in paint order, followed by a present.
    pub fn submit_frame(&self, list: &mut DrawList) -> usize {
        let mut count = 0;
        for item in list.iter_in_paint_order() {
            self.device.submit(DeviceCommand::Draw(item.call.clone()));
            count += 1;
        }
        self.device.submit(DeviceCommand::Present);
        count
    }

    /// Drains the queue on the calling thread in [`RendererMode::Manual`].
    /// Returns the number of commands processed; always 0 when threaded.
    pub fn process_commands(&mut self) -> usize {
        let Executor::Manual(worker) = &mut self.executor else {
            return 0;
        };

        let (processed, flow) = worker.drain();
        if flow == Flow::Stop {
            self.executor = Executor::Stopped;
        }
        processed
    }

    pub fn stats(&self) -> DeviceStats {
        self.device.stats()
    }

    /// Stops the device after everything already queued and joins its thread.
    /// Later submissions through any device handle are dropped.
    pub fn shutdown(&mut self) {
        if matches!(self.executor, Executor::Stopped) {
            return;
        }

        self.device.submit(DeviceCommand::Shutdown);
        self.device.mark_shut_down();

        match std::mem::replace(&mut self.executor, Executor::Stopped) {
            Executor::Threaded(handle) => {
                if handle.join().is_err() {
                    log::error!("device thread panicked");
                }
            }
            Executor::Manual(mut worker) => {
                worker.drain();
            }
            Executor::Stopped => {}
        }

        log::info!("renderer stopped: device {}", self.device.id());
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("device", &self.device)
            .field("mode", &self.config.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BackendOp, HeadlessBackend, HeadlessProbe};
    use crate::graphics::{PixelFormat, SamplerAddressMode, SamplerState, Texture, TextureFlags};

    fn manual() -> (Renderer, HeadlessProbe) {
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let config = RendererConfig { mode: RendererMode::Manual, ..RendererConfig::default() };
        (Renderer::new(config, Box::new(backend)).unwrap(), probe)
    }

    #[test]
    fn manual_mode_runs_nothing_until_processed() {
        let (mut renderer, probe) = manual();
        renderer.set_size(Size2::new(800.0, 600.0));
        assert!(probe.is_empty());

        // Frame clear, sampler defaults, resize.
        assert_eq!(renderer.process_commands(), 3);
        assert_eq!(probe.ops()[1], BackendOp::Resize { width: 800, height: 600 });
    }

    // ── sampler defaults ──

    #[test]
    fn default_samplers_use_configured_filter_and_anisotropy() {
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let config = RendererConfig {
            mode: RendererMode::Manual,
            texture_filter: SamplerFilter::Point,
            max_anisotropy: 4,
            ..RendererConfig::default()
        };
        let mut renderer = Renderer::new(config, Box::new(backend)).unwrap();

        let mut tex = Texture::new(renderer.device());
        tex.init(Size2::new(4.0, 4.0), TextureFlags::RENDER_TARGET, 1, 1, PixelFormat::Rgba8Unorm)
            .unwrap();
        tex.set_address_x(SamplerAddressMode::Repeat);
        renderer.process_commands();

        let resolved = SamplerState {
            filter: SamplerFilter::Point,
            address_x: SamplerAddressMode::Repeat,
            max_anisotropy: 4,
            ..SamplerState::default()
        };
        let ops = probe.ops();
        assert!(ops.contains(&BackendOp::ConfigureSampler { id: tex.id(), sampler: resolved }));
        // The handle keeps what it asked for.
        assert_eq!(tex.filter(), SamplerFilter::Default);
    }

    #[test]
    fn explicit_sampler_fields_override_config() {
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let config = RendererConfig { mode: RendererMode::Manual, max_anisotropy: 8, ..RendererConfig::default() };
        let mut renderer = Renderer::new(config, Box::new(backend)).unwrap();

        let mut tex = Texture::new(renderer.device());
        tex.init(Size2::new(4.0, 4.0), TextureFlags::RENDER_TARGET, 1, 1, PixelFormat::Rgba8Unorm)
            .unwrap();
        tex.set_filter(SamplerFilter::Trilinear);
        tex.set_max_anisotropy(2);
        renderer.process_commands();

        let last = probe.ops().into_iter().rev().find_map(|op| match op {
            BackendOp::ConfigureSampler { sampler, .. } => Some(sampler),
            _ => None,
        });
        let sampler = last.unwrap();
        assert_eq!(sampler.filter, SamplerFilter::Trilinear);
        assert_eq!(sampler.max_anisotropy, 2);
    }

    #[test]
    fn empty_frame_still_presents() {
        let (mut renderer, probe) = manual();
        renderer.process_commands();
        probe.clear();

        assert_eq!(renderer.submit_frame(&mut DrawList::new()), 0);
        renderer.process_commands();
        assert_eq!(probe.ops(), vec![BackendOp::Present]);
        assert_eq!(renderer.stats().frames, 1);
    }

    #[test]
    fn unchanged_clear_is_not_resent() {
        let (mut renderer, _probe) = manual();
        renderer.process_commands();
        renderer.set_clear_color(Color::BLACK);
        assert_eq!(renderer.device().pending(), 0);

        renderer.set_clear_color(Color::WHITE);
        assert_eq!(renderer.device().pending(), 1);
        assert_eq!(renderer.clear_state().color, Color::WHITE);
    }

    #[test]
    fn threaded_shutdown_drains_queue() {
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let mut renderer = Renderer::new(RendererConfig::default(), Box::new(backend)).unwrap();

        let mut tex = Texture::new(renderer.device());
        tex.init(Size2::new(8.0, 8.0), TextureFlags::RENDER_TARGET, 1, 1, PixelFormat::Rgba8Unorm)
            .unwrap();
        renderer.shutdown();

        let ops = probe.ops();
        assert!(matches!(ops.last(), Some(BackendOp::UploadTexture { width: 8, .. })));
        assert!(!renderer.device().is_alive());

        // Dropping after shutdown must not enqueue a release.
        let submitted = renderer.stats().submitted;
        drop(tex);
        assert_eq!(renderer.stats().submitted, submitted);
    }

    #[test]
    fn execute_on_render_thread_sees_backend() {
        let (mut renderer, _probe) = manual();
        let (tx, rx) = flume::unbounded();
        renderer.execute_on_render_thread(move |backend| {
            let _ = tx.send(backend.name());
        });
        renderer.process_commands();
        assert_eq!(rx.try_recv().ok(), Some("headless"));
    }
}

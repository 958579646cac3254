use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;

use crate::error::{Error, Result};

use super::command::DeviceCommand;
use super::queue::{CommandReceiver, StatsCounters};
use super::resource::ResourceTables;
use super::{DeviceBackend, DeviceError, DeviceResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Executes device commands in submission order against a backend.
///
/// Runs either on its own thread ([`DeviceWorker::spawn`]) or is pumped on the
/// calling thread with [`DeviceWorker::drain`].
pub(crate) struct DeviceWorker {
    backend: Box<dyn DeviceBackend>,
    rx: flume::Receiver<DeviceCommand>,
    stats: Arc<StatsCounters>,
    tables: ResourceTables,
}

impl DeviceWorker {
    pub(crate) fn new(backend: Box<dyn DeviceBackend>, receiver: CommandReceiver) -> Self {
        Self {
            backend,
            rx: receiver.rx,
            stats: receiver.stats,
            tables: ResourceTables::default(),
        }
    }

    /// Applies everything currently queued. Returns the number of commands
    /// processed and whether a shutdown was seen.
    pub(crate) fn drain(&mut self) -> (usize, Flow) {
        let mut processed = 0;
        while let Ok(command) = self.rx.try_recv() {
            processed += 1;
            if self.apply(command) == Flow::Stop {
                return (processed, Flow::Stop);
            }
        }
        (processed, Flow::Continue)
    }

    /// Blocks on the queue until shutdown or until every sender is gone.
    pub(crate) fn run(mut self) {
        log::info!("device worker started (backend: {})", self.backend.name());
        while let Ok(command) = self.rx.recv() {
            if self.apply(command) == Flow::Stop {
                break;
            }
        }
        log::info!("device worker stopped");
    }

    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("kestrel-device".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::DeviceThread(e.to_string()))
    }

    pub(crate) fn apply(&mut self, command: DeviceCommand) -> Flow {
        log::trace!("device: {command:?}");

        let backend = self.backend.as_mut();
        let tables = &mut self.tables;

        let result: DeviceResult<()> = match command {
            DeviceCommand::CreateTexture(id) => tables.create_texture(id, backend),
            DeviceCommand::Texture(id, c) => tables.apply_texture(id, c, backend),
            DeviceCommand::CreateBuffer(id) => tables.create_buffer(id, backend),
            DeviceCommand::Buffer(id, c) => tables.apply_buffer(id, c, backend),
            DeviceCommand::CreateMeshBuffer(id) => tables.create_mesh_buffer(id, backend),
            DeviceCommand::MeshBuffer(id, c) => tables.apply_mesh_buffer(id, c, backend),
            DeviceCommand::Release(key) => tables.release(key, backend),
            DeviceCommand::Resize(size) => {
                let (width, height) = size.to_extent();
                backend.resize(width, height)
            }
            DeviceCommand::SetFrameClear(clear) => backend.set_frame_clear(&clear),
            DeviceCommand::SetSamplerDefaults(defaults) => {
                tables.sampler_defaults = defaults;
                Ok(())
            }
            DeviceCommand::Draw(call) => tables.check_draw(&call).and_then(|()| {
                backend.draw(&call)?;
                self.stats.draw_calls.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
            DeviceCommand::Present => backend.present().map(|()| {
                self.stats.frames.fetch_add(1, Ordering::Relaxed);
            }),
            DeviceCommand::Execute(task) => {
                task(backend);
                Ok(())
            }
            DeviceCommand::Shutdown => {
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                return Flow::Stop;
            }
        };

        match result {
            Ok(()) => {
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                if matches!(e, DeviceError::UnknownResource(_)) {
                    self.stats.unknown_resource.fetch_add(1, Ordering::Relaxed);
                }
                log::error!("device command failed: {e}");
            }
        }

        Flow::Continue
    }

    #[cfg(test)]
    pub(crate) fn tables(&self) -> &ResourceTables {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Size2;
    use crate::device::command::{BufferCommand, DrawCall, MeshBufferCommand, TextureCommand, TextureInit};
    use crate::device::{BackendOp, BufferId, HeadlessBackend, HeadlessProbe, MeshBufferId, RenderDevice, ResourceKey, TextureId};
    use crate::graphics::{
        BufferFlags, BufferUsage, DEFAULT_VERTEX_ATTRIBUTES, MeshBufferState, MipLevel, PixelFormat,
        SamplerFilter, TextureFlags, TextureState,
    };

    fn setup() -> (RenderDevice, DeviceWorker, HeadlessProbe) {
        let (device, receiver) = RenderDevice::new();
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        (device, DeviceWorker::new(Box::new(backend), receiver), probe)
    }

    fn rgba_init(width: u32, height: u32) -> TextureInit {
        TextureInit {
            state: TextureState {
                size: Size2::from_extent(width, height),
                format: PixelFormat::Rgba8Unorm,
                ..TextureState::default()
            },
            levels: vec![MipLevel { width, height, data: vec![255; (width * height * 4) as usize] }],
        }
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn commands_apply_in_submission_order() {
        let (device, mut worker, probe) = setup();
        let tex: TextureId = device.allocate();

        device.submit(DeviceCommand::CreateTexture(tex));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::Init(rgba_init(2, 2))));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::SetFilter(SamplerFilter::Point)));
        device.submit(DeviceCommand::Present);

        let (n, flow) = worker.drain();
        assert_eq!((n, flow), (4, Flow::Continue));

        let ops = probe.ops();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0], BackendOp::CreateTexture(tex));
        assert!(matches!(ops[1], BackendOp::UploadTexture { width: 2, height: 2, .. }));
        assert!(matches!(ops[2], BackendOp::ConfigureSampler { .. }));
        assert_eq!(ops[3], BackendOp::Present);
    }

    #[test]
    fn execute_runs_after_earlier_commands() {
        let (device, mut worker, probe) = setup();
        let tex: TextureId = device.allocate();
        device.submit(DeviceCommand::CreateTexture(tex));

        let (tx, rx) = flume::unbounded();
        let seen = probe.clone();
        device.execute(move |backend| {
            let _ = tx.send((backend.name(), seen.len()));
        });
        worker.drain();

        assert_eq!(rx.try_recv().ok(), Some(("headless", 1)));
    }

    #[test]
    fn shutdown_stops_before_later_commands() {
        let (device, mut worker, probe) = setup();
        device.submit(DeviceCommand::Present);
        device.submit(DeviceCommand::Shutdown);
        device.submit(DeviceCommand::Present);

        assert_eq!(worker.drain(), (2, Flow::Stop));
        assert_eq!(probe.len(), 1);
    }

    // ── release / use-after-free ──────────────────────────────────────────

    #[test]
    fn release_after_pending_updates() {
        let (device, mut worker, probe) = setup();
        let tex: TextureId = device.allocate();
        device.submit(DeviceCommand::CreateTexture(tex));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::Init(rgba_init(1, 1))));
        device.release(ResourceKey::Texture(tex));
        worker.drain();

        assert_eq!(probe.ops().last(), Some(&BackendOp::DestroyTexture(tex)));
        assert!(worker.tables().textures.is_empty());
    }

    #[test]
    fn command_on_released_id_is_counted_and_ignored() {
        let (device, mut worker, probe) = setup();
        let tex: TextureId = device.allocate();
        device.submit(DeviceCommand::CreateTexture(tex));
        device.release(ResourceKey::Texture(tex));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::SetMaxAnisotropy(4)));
        worker.drain();

        let stats = device.stats();
        assert_eq!(stats.unknown_resource, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.applied, 2);
        assert_eq!(probe.len(), 2);
    }

    #[test]
    fn draw_with_missing_mesh_buffer_is_rejected() {
        let (device, mut worker, probe) = setup();
        let mesh: MeshBufferId = device.allocate();
        device.submit(DeviceCommand::Draw(DrawCall::new(mesh)));
        worker.drain();

        assert_eq!(device.stats().unknown_resource, 1);
        assert!(probe.is_empty());
    }

    #[test]
    fn draw_after_vertex_buffer_release_is_rejected() {
        let (device, mut worker, probe) = setup();
        let ib: BufferId = device.allocate();
        let vb: BufferId = device.allocate();
        let mesh: MeshBufferId = device.allocate();
        device.submit(DeviceCommand::CreateBuffer(ib));
        device.submit(DeviceCommand::CreateBuffer(vb));
        device.submit(DeviceCommand::CreateMeshBuffer(mesh));
        device.submit(DeviceCommand::MeshBuffer(
            mesh,
            MeshBufferCommand::Init(MeshBufferState {
                index_size: 2,
                index_buffer: Some(ib),
                vertex_buffer: Some(vb),
                ..MeshBufferState::default()
            }),
        ));
        device.release(ResourceKey::Buffer(vb));
        device.submit(DeviceCommand::Draw(DrawCall::new(mesh)));
        worker.drain();

        let stats = device.stats();
        assert_eq!(stats.unknown_resource, 1);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(probe.ops().last(), Some(&BackendOp::DestroyBuffer(vb)));
    }

    // ── failure keeps last-good state ─────────────────────────────────────

    #[test]
    fn failed_upload_keeps_previous_state() {
        let (device, mut worker, probe) = setup();
        let tex: TextureId = device.allocate();
        device.submit(DeviceCommand::CreateTexture(tex));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::Init(rgba_init(4, 4))));
        worker.drain();

        probe.set_fail_uploads(true);
        device.submit(DeviceCommand::Texture(tex, TextureCommand::SetSize(Size2::new(8.0, 8.0))));
        worker.drain();

        let texture = &worker.tables().textures[&tex];
        assert_eq!(texture.state.size, Size2::new(4.0, 4.0));
        assert_eq!(texture.levels.len(), 1);
        assert_eq!(device.stats().failed, 1);
    }

    #[test]
    fn inconsistent_mip_chain_fails_before_upload() {
        let (device, mut worker, probe) = setup();
        let tex: TextureId = device.allocate();
        let mut init = rgba_init(2, 2);
        init.levels.push(MipLevel { width: 2, height: 2, data: vec![0; 16] });

        device.submit(DeviceCommand::CreateTexture(tex));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::Init(init)));
        worker.drain();

        assert_eq!(device.stats().failed, 1);
        assert_eq!(probe.ops(), vec![BackendOp::CreateTexture(tex)]);
        assert!(worker.tables().textures[&tex].levels.is_empty());
    }

    #[test]
    fn base_level_must_match_texture_size() {
        let (device, mut worker, probe) = setup();
        let tex: TextureId = device.allocate();
        let mut init = rgba_init(2, 2);
        init.state.size = Size2::new(4.0, 4.0);

        device.submit(DeviceCommand::CreateTexture(tex));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::Init(init)));
        worker.drain();

        assert_eq!(device.stats().failed, 1);
        assert_eq!(probe.len(), 1);
    }

    #[test]
    fn generate_mipmaps_expands_single_level() {
        let (device, mut worker, _probe) = setup();
        let tex: TextureId = device.allocate();
        let mut init = rgba_init(4, 4);
        init.state.flags = TextureFlags::GENERATE_MIPMAPS;
        init.state.mip_levels = 3;

        device.submit(DeviceCommand::CreateTexture(tex));
        device.submit(DeviceCommand::Texture(tex, TextureCommand::Init(init)));
        worker.drain();

        assert_eq!(worker.tables().textures[&tex].levels.len(), 3);
    }

    // ── buffers / mesh buffers ────────────────────────────────────────────

    #[test]
    fn static_buffer_rejects_later_data() {
        let (device, mut worker, _probe) = setup();
        let buf: BufferId = device.allocate();
        device.submit(DeviceCommand::CreateBuffer(buf));
        device.submit(DeviceCommand::Buffer(
            buf,
            BufferCommand::Init { usage: BufferUsage::Vertex, flags: BufferFlags::empty(), data: vec![1, 2, 3] },
        ));
        device.submit(DeviceCommand::Buffer(buf, BufferCommand::SetData(vec![9])));
        worker.drain();

        assert_eq!(worker.tables().buffers[&buf].data, vec![1, 2, 3]);
        assert_eq!(device.stats().failed, 1);
    }

    #[test]
    fn mesh_buffer_stride_follows_attributes() {
        let (device, mut worker, probe) = setup();
        let vb: BufferId = device.allocate();
        let mesh: MeshBufferId = device.allocate();
        device.submit(DeviceCommand::CreateBuffer(vb));
        device.submit(DeviceCommand::CreateMeshBuffer(mesh));
        device.submit(DeviceCommand::MeshBuffer(
            mesh,
            MeshBufferCommand::Init(MeshBufferState {
                index_size: 2,
                vertex_buffer: Some(vb),
                ..MeshBufferState::default()
            }),
        ));
        device.submit(DeviceCommand::MeshBuffer(
            mesh,
            MeshBufferCommand::SetVertexAttributes(DEFAULT_VERTEX_ATTRIBUTES.to_vec()),
        ));
        worker.drain();

        assert_eq!(worker.tables().mesh_buffers[&mesh].state.vertex_stride, 36);
        assert!(matches!(
            probe.ops().last(),
            Some(BackendOp::ConfigureMeshBuffer { vertex_stride: 36, .. })
        ));
    }
}

//! Device backend seam.
//!
//! The worker resolves ids against its tables and validates every command,
//! then hands the already-checked operation to a [`DeviceBackend`]. A backend
//! only has to translate operations into native API calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::graphics::{
    BufferFlags, BufferUsage, ClearState, MeshBufferState, MipLevel, PixelFormat, SamplerState,
    TextureState,
};

use super::command::DrawCall;
use super::{BufferId, DeviceError, DeviceResult, MeshBufferId, TextureId};

/// Native graphics API driven by the device worker.
///
/// Every method runs on the device thread. Returning an error leaves the
/// worker's copy of the resource at its previous state.
pub trait DeviceBackend: Send {
    fn name(&self) -> &'static str;

    fn create_texture(&mut self, id: TextureId) -> DeviceResult<()>;
    /// (Re)allocates texture storage and uploads `levels` (may be empty).
    fn upload_texture(&mut self, id: TextureId, state: &TextureState, levels: &[MipLevel]) -> DeviceResult<()>;
    fn configure_sampler(&mut self, id: TextureId, sampler: &SamplerState) -> DeviceResult<()>;
    fn configure_clear(&mut self, id: TextureId, clear: &ClearState) -> DeviceResult<()>;
    fn destroy_texture(&mut self, id: TextureId);

    fn create_buffer(&mut self, id: BufferId) -> DeviceResult<()>;
    fn upload_buffer(&mut self, id: BufferId, usage: BufferUsage, flags: BufferFlags, data: &[u8]) -> DeviceResult<()>;
    fn destroy_buffer(&mut self, id: BufferId);

    fn create_mesh_buffer(&mut self, id: MeshBufferId) -> DeviceResult<()>;
    fn configure_mesh_buffer(&mut self, id: MeshBufferId, state: &MeshBufferState) -> DeviceResult<()>;
    fn destroy_mesh_buffer(&mut self, id: MeshBufferId);

    /// Resizes the back buffer (physical pixels).
    fn resize(&mut self, width: u32, height: u32) -> DeviceResult<()>;
    fn set_frame_clear(&mut self, clear: &ClearState) -> DeviceResult<()>;
    fn draw(&mut self, call: &DrawCall) -> DeviceResult<()>;
    fn present(&mut self) -> DeviceResult<()>;
}

/// Operation observed by [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOp {
    CreateTexture(TextureId),
    UploadTexture { id: TextureId, width: u32, height: u32, format: PixelFormat, levels: usize },
    ConfigureSampler { id: TextureId, sampler: SamplerState },
    ConfigureClear { id: TextureId, clear: ClearState },
    DestroyTexture(TextureId),
    CreateBuffer(BufferId),
    UploadBuffer { id: BufferId, usage: BufferUsage, len: usize },
    DestroyBuffer(BufferId),
    CreateMeshBuffer(MeshBufferId),
    ConfigureMeshBuffer { id: MeshBufferId, index_size: u32, vertex_stride: u32 },
    DestroyMeshBuffer(MeshBufferId),
    Resize { width: u32, height: u32 },
    SetFrameClear(ClearState),
    Draw { mesh_buffer: MeshBufferId, render_target: Option<TextureId> },
    Present,
}

/// Shared view into a [`HeadlessBackend`] that stays usable after the
/// backend moved to the device thread.
#[derive(Debug, Clone, Default)]
pub struct HeadlessProbe {
    inner: Arc<ProbeInner>,
}

#[derive(Debug, Default)]
struct ProbeInner {
    ops: Mutex<Vec<BackendOp>>,
    fail_uploads: AtomicBool,
}

impl HeadlessProbe {
    /// Operations applied so far, in execution order.
    pub fn ops(&self) -> Vec<BackendOp> {
        self.inner.ops.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.ops.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.ops.lock().clear();
    }

    /// Makes subsequent texture and buffer uploads fail, simulating a device error.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.inner.fail_uploads.store(fail, Ordering::Relaxed);
    }

    fn push(&self, op: BackendOp) {
        log::trace!("headless: {op:?}");
        self.inner.ops.lock().push(op);
    }

    fn upload_allowed(&self) -> DeviceResult<()> {
        if self.inner.fail_uploads.load(Ordering::Relaxed) {
            Err(DeviceError::Backend("simulated upload failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Backend without a GPU. Records every operation it receives.
///
/// Used for servers, CI and tests.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    probe: HeadlessProbe,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl DeviceBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_texture(&mut self, id: TextureId) -> DeviceResult<()> {
        self.probe.push(BackendOp::CreateTexture(id));
        Ok(())
    }

    fn upload_texture(&mut self, id: TextureId, state: &TextureState, levels: &[MipLevel]) -> DeviceResult<()> {
        self.probe.upload_allowed()?;
        let (width, height) = state.size.to_extent();
        self.probe.push(BackendOp::UploadTexture {
            id,
            width,
            height,
            format: state.format,
            levels: levels.len(),
        });
        Ok(())
    }

    fn configure_sampler(&mut self, id: TextureId, sampler: &SamplerState) -> DeviceResult<()> {
        self.probe.push(BackendOp::ConfigureSampler { id, sampler: *sampler });
        Ok(())
    }

    fn configure_clear(&mut self, id: TextureId, clear: &ClearState) -> DeviceResult<()> {
        self.probe.push(BackendOp::ConfigureClear { id, clear: *clear });
        Ok(())
    }

    fn destroy_texture(&mut self, id: TextureId) {
        self.probe.push(BackendOp::DestroyTexture(id));
    }

    fn create_buffer(&mut self, id: BufferId) -> DeviceResult<()> {
        self.probe.push(BackendOp::CreateBuffer(id));
        Ok(())
    }

    fn upload_buffer(&mut self, id: BufferId, usage: BufferUsage, _flags: BufferFlags, data: &[u8]) -> DeviceResult<()> {
        self.probe.upload_allowed()?;
        self.probe.push(BackendOp::UploadBuffer { id, usage, len: data.len() });
        Ok(())
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        self.probe.push(BackendOp::DestroyBuffer(id));
    }

    fn create_mesh_buffer(&mut self, id: MeshBufferId) -> DeviceResult<()> {
        self.probe.push(BackendOp::CreateMeshBuffer(id));
        Ok(())
    }

    fn configure_mesh_buffer(&mut self, id: MeshBufferId, state: &MeshBufferState) -> DeviceResult<()> {
        self.probe.push(BackendOp::ConfigureMeshBuffer {
            id,
            index_size: state.index_size,
            vertex_stride: state.vertex_stride,
        });
        Ok(())
    }

    fn destroy_mesh_buffer(&mut self, id: MeshBufferId) {
        self.probe.push(BackendOp::DestroyMeshBuffer(id));
    }

    fn resize(&mut self, width: u32, height: u32) -> DeviceResult<()> {
        self.probe.push(BackendOp::Resize { width, height });
        Ok(())
    }

    fn set_frame_clear(&mut self, clear: &ClearState) -> DeviceResult<()> {
        self.probe.push(BackendOp::SetFrameClear(*clear));
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> DeviceResult<()> {
        self.probe.push(BackendOp::Draw {
            mesh_buffer: call.mesh_buffer,
            render_target: call.render_target,
        });
        Ok(())
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.probe.push(BackendOp::Present);
        Ok(())
    }
}

use crate::device::command::{DeviceCommand, MeshBufferCommand};
use crate::device::{BufferId, DeviceId, MeshBufferId, RenderDevice, ResourceKey};
use crate::error::{Error, Result};

use super::{Buffer, VertexAttribute, validate_attributes, vertex_stride};

/// Index/vertex binding of a mesh buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshBufferState {
    /// Bytes per index: 2 or 4 (0 before init).
    pub index_size: u32,
    pub index_buffer: Option<BufferId>,
    pub vertex_attributes: Vec<VertexAttribute>,
    /// Derived from `vertex_attributes`.
    pub vertex_stride: u32,
    pub vertex_buffer: Option<BufferId>,
}

/// Application-side mesh buffer: which buffers hold indices and vertices, and
/// how a vertex is laid out.
#[derive(Debug)]
pub struct MeshBuffer {
    device: RenderDevice,
    id: MeshBufferId,
    state: MeshBufferState,
}

impl MeshBuffer {
    pub fn new(device: &RenderDevice) -> Self {
        let id: MeshBufferId = device.allocate();
        device.submit(DeviceCommand::CreateMeshBuffer(id));

        Self {
            device: device.clone(),
            id,
            state: MeshBufferState::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> MeshBufferId {
        self.id
    }

    #[inline]
    pub fn device_id(&self) -> DeviceId {
        self.id.device()
    }

    pub fn init(
        &mut self,
        index_size: u32,
        index_buffer: &Buffer,
        vertex_attributes: Vec<VertexAttribute>,
        vertex_buffer: &Buffer,
    ) -> Result<()> {
        validate_index_size(index_size)?;
        validate_attributes(&vertex_attributes)?;
        self.check_device(index_buffer)?;
        self.check_device(vertex_buffer)?;

        self.state = MeshBufferState {
            index_size,
            index_buffer: Some(index_buffer.id()),
            vertex_stride: vertex_stride(&vertex_attributes),
            vertex_attributes,
            vertex_buffer: Some(vertex_buffer.id()),
        };
        self.send(MeshBufferCommand::Init(self.state.clone()));
        Ok(())
    }

    pub fn state(&self) -> &MeshBufferState {
        &self.state
    }

    pub fn index_size(&self) -> u32 {
        self.state.index_size
    }

    pub fn index_buffer(&self) -> Option<BufferId> {
        self.state.index_buffer
    }

    pub fn vertex_attributes(&self) -> &[VertexAttribute] {
        &self.state.vertex_attributes
    }

    pub fn vertex_stride(&self) -> u32 {
        self.state.vertex_stride
    }

    pub fn vertex_buffer(&self) -> Option<BufferId> {
        self.state.vertex_buffer
    }

    pub fn set_index_size(&mut self, index_size: u32) -> Result<()> {
        validate_index_size(index_size)?;
        self.state.index_size = index_size;
        self.send(MeshBufferCommand::SetIndexSize(index_size));
        Ok(())
    }

    pub fn set_index_buffer(&mut self, buffer: &Buffer) -> Result<()> {
        self.check_device(buffer)?;
        self.state.index_buffer = Some(buffer.id());
        self.send(MeshBufferCommand::SetIndexBuffer(Some(buffer.id())));
        Ok(())
    }

    pub fn set_vertex_attributes(&mut self, attributes: Vec<VertexAttribute>) -> Result<()> {
        validate_attributes(&attributes)?;
        self.state.vertex_stride = vertex_stride(&attributes);
        self.state.vertex_attributes = attributes.clone();
        self.send(MeshBufferCommand::SetVertexAttributes(attributes));
        Ok(())
    }

    pub fn set_vertex_buffer(&mut self, buffer: &Buffer) -> Result<()> {
        self.check_device(buffer)?;
        self.state.vertex_buffer = Some(buffer.id());
        self.send(MeshBufferCommand::SetVertexBuffer(Some(buffer.id())));
        Ok(())
    }

    fn check_device(&self, buffer: &Buffer) -> Result<()> {
        if buffer.device_id() != self.device_id() {
            return Err(Error::ForeignResource { expected: self.device_id(), actual: buffer.device_id() });
        }
        Ok(())
    }

    fn send(&self, command: MeshBufferCommand) {
        self.device.submit(DeviceCommand::MeshBuffer(self.id, command));
    }
}

impl Drop for MeshBuffer {
    fn drop(&mut self) {
        self.device.release(ResourceKey::MeshBuffer(self.id));
    }
}

fn validate_index_size(index_size: u32) -> Result<()> {
    match index_size {
        2 | 4 => Ok(()),
        other => Err(Error::InvalidIndexSize(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::worker::DeviceWorker;
    use crate::device::{BackendOp, DrawCall, HeadlessBackend};
    use crate::graphics::{BufferFlags, BufferUsage, DEFAULT_VERTEX_ATTRIBUTES, DataType, VertexSemantic};

    fn buffers(device: &RenderDevice) -> (Buffer, Buffer) {
        let mut ib = Buffer::new(device);
        ib.init_from_slice(BufferUsage::Index, BufferFlags::empty(), &[0u16, 1, 2]).unwrap();
        let mut vb = Buffer::new(device);
        vb.init(BufferUsage::Vertex, BufferFlags::DYNAMIC, vec![0; 108]).unwrap();
        (ib, vb)
    }

    #[test]
    fn init_derives_stride() {
        let (device, _rx) = RenderDevice::new();
        let (ib, vb) = buffers(&device);
        let mut mesh = MeshBuffer::new(&device);
        mesh.init(2, &ib, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &vb).unwrap();

        assert_eq!(mesh.vertex_stride(), 36);
        assert_eq!(mesh.index_buffer(), Some(ib.id()));
        assert_eq!(mesh.vertex_buffer(), Some(vb.id()));
    }

    #[test]
    fn bad_index_size_leaves_state_untouched() {
        let (device, _rx) = RenderDevice::new();
        let (ib, vb) = buffers(&device);
        let mut mesh = MeshBuffer::new(&device);
        let before = device.pending();

        assert!(matches!(
            mesh.init(3, &ib, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &vb),
            Err(Error::InvalidIndexSize(3))
        ));
        assert!(mesh.set_index_size(1).is_err());

        assert_eq!(mesh.state(), &MeshBufferState::default());
        assert_eq!(device.pending(), before);
    }

    #[test]
    fn buffers_from_another_device_are_rejected() {
        let (device, _rx) = RenderDevice::new();
        let (other, _other_rx) = RenderDevice::new();
        let (ib, _vb) = buffers(&device);
        let (_ib2, foreign_vb) = buffers(&other);

        let mut mesh = MeshBuffer::new(&device);
        let err = mesh.init(2, &ib, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &foreign_vb).unwrap_err();
        assert!(matches!(err, Error::ForeignResource { .. }));
        assert_eq!(mesh.index_buffer(), None);
    }

    // ── setters ──

    #[test]
    fn set_buffers_rebinds_on_both_sides() {
        let (device, receiver) = RenderDevice::new();
        let mut worker = DeviceWorker::new(Box::new(HeadlessBackend::new()), receiver);

        let (ib, vb) = buffers(&device);
        let (ib2, vb2) = buffers(&device);
        let mut mesh = MeshBuffer::new(&device);
        mesh.init(2, &ib, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &vb).unwrap();
        mesh.set_index_buffer(&ib2).unwrap();
        mesh.set_vertex_buffer(&vb2).unwrap();

        assert_eq!(mesh.index_buffer(), Some(ib2.id()));
        assert_eq!(mesh.vertex_buffer(), Some(vb2.id()));

        worker.drain();
        let table = &worker.tables().mesh_buffers[&mesh.id()].state;
        assert_eq!(table, mesh.state());
        assert_eq!(device.stats().failed, 0);
    }

    #[test]
    fn setters_reject_foreign_buffers() {
        let (device, _rx) = RenderDevice::new();
        let (other, _other_rx) = RenderDevice::new();
        let (ib, vb) = buffers(&device);
        let (foreign_ib, foreign_vb) = buffers(&other);

        let mut mesh = MeshBuffer::new(&device);
        mesh.init(2, &ib, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &vb).unwrap();
        let before = device.pending();

        assert!(matches!(mesh.set_index_buffer(&foreign_ib), Err(Error::ForeignResource { .. })));
        assert!(matches!(mesh.set_vertex_buffer(&foreign_vb), Err(Error::ForeignResource { .. })));

        assert_eq!(mesh.index_buffer(), Some(ib.id()));
        assert_eq!(mesh.vertex_buffer(), Some(vb.id()));
        assert_eq!(device.pending(), before);
    }

    #[test]
    fn draw_after_dropping_vertex_buffer_is_skipped() {
        let (device, receiver) = RenderDevice::new();
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let mut worker = DeviceWorker::new(Box::new(backend), receiver);

        let (ib, vb) = buffers(&device);
        let mut mesh = MeshBuffer::new(&device);
        mesh.init(2, &ib, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &vb).unwrap();
        drop(vb);
        device.submit(DeviceCommand::Draw(DrawCall::new(mesh.id())));
        worker.drain();

        assert_eq!(device.stats().unknown_resource, 1);
        assert!(!probe.ops().iter().any(|op| matches!(op, BackendOp::Draw { .. })));
    }

    #[test]
    fn attribute_change_recomputes_stride_on_both_sides() {
        let (device, receiver) = RenderDevice::new();
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        let mut worker = DeviceWorker::new(Box::new(backend), receiver);

        let (ib, vb) = buffers(&device);
        let mut mesh = MeshBuffer::new(&device);
        mesh.init(4, &ib, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &vb).unwrap();
        mesh.set_vertex_attributes(vec![VertexAttribute::new(VertexSemantic::Position, 2, DataType::Float)])
            .unwrap();
        assert_eq!(mesh.vertex_stride(), 8);

        worker.drain();
        assert!(matches!(
            probe.ops().last(),
            Some(BackendOp::ConfigureMeshBuffer { index_size: 4, vertex_stride: 8, .. })
        ));
        assert_eq!(device.stats().failed, 0);
    }
}

use bitflags::bitflags;

use crate::device::command::{BufferCommand, DeviceCommand};
use crate::device::{BufferId, DeviceId, RenderDevice, ResourceKey};
use crate::error::{Error, Result};

/// What a buffer stores.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    Index,
    Vertex,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// Contents may be replaced after init.
        const DYNAMIC = 1 << 0;
    }
}

/// Application-side index or vertex buffer.
#[derive(Debug)]
pub struct Buffer {
    device: RenderDevice,
    id: BufferId,
    usage: Option<BufferUsage>,
    flags: BufferFlags,
    data: Vec<u8>,
}

impl Buffer {
    pub fn new(device: &RenderDevice) -> Self {
        let id: BufferId = device.allocate();
        device.submit(DeviceCommand::CreateBuffer(id));

        Self {
            device: device.clone(),
            id,
            usage: None,
            flags: BufferFlags::empty(),
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    #[inline]
    pub fn device_id(&self) -> DeviceId {
        self.id.device()
    }

    pub fn init(&mut self, usage: BufferUsage, flags: BufferFlags, data: Vec<u8>) -> Result<()> {
        self.usage = Some(usage);
        self.flags = flags;
        self.data = data.clone();
        self.send(BufferCommand::Init { usage, flags, data });
        Ok(())
    }

    /// Convenience over [`Buffer::init`] for typed slices (vertices, indices).
    pub fn init_from_slice<T: bytemuck::Pod>(&mut self, usage: BufferUsage, flags: BufferFlags, items: &[T]) -> Result<()> {
        self.init(usage, flags, bytemuck::cast_slice(items).to_vec())
    }

    /// Replaces the contents of a dynamic buffer.
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<()> {
        if self.usage.is_none() {
            return Err(Error::BufferNotInitialized);
        }
        if !self.flags.contains(BufferFlags::DYNAMIC) {
            return Err(Error::BufferNotDynamic);
        }
        self.data = data.clone();
        self.send(BufferCommand::SetData(data));
        Ok(())
    }

    pub fn usage(&self) -> Option<BufferUsage> {
        self.usage
    }

    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn send(&self, command: BufferCommand) {
        self.device.submit(DeviceCommand::Buffer(self.id, command));
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device.release(ResourceKey::Buffer(self.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_init_stores_bytes() {
        let (device, _rx) = RenderDevice::new();
        let mut buf = Buffer::new(&device);
        buf.init_from_slice(BufferUsage::Index, BufferFlags::empty(), &[0u16, 1, 2]).unwrap();

        assert_eq!(buf.len(), 6);
        assert_eq!(buf.usage(), Some(BufferUsage::Index));
    }

    #[test]
    fn set_data_requires_init_and_dynamic() {
        let (device, _rx) = RenderDevice::new();
        let mut buf = Buffer::new(&device);
        assert!(matches!(buf.set_data(vec![1]), Err(Error::BufferNotInitialized)));

        buf.init(BufferUsage::Vertex, BufferFlags::empty(), vec![1, 2]).unwrap();
        assert!(matches!(buf.set_data(vec![3]), Err(Error::BufferNotDynamic)));
        assert_eq!(buf.data(), &[1, 2]);

        buf.init(BufferUsage::Vertex, BufferFlags::DYNAMIC, vec![1, 2]).unwrap();
        buf.set_data(vec![3]).unwrap();
        assert_eq!(buf.data(), &[3]);
    }
}

use std::fmt;

use crate::coords::{Mat4, Rect, Size2};
use crate::graphics::{
    BufferFlags, BufferUsage, ClearState, MeshBufferState, MipLevel, SamplerAddressMode,
    SamplerDefaults, SamplerFilter, TextureState, VertexAttribute,
};
use crate::paint::Color;

use super::{BufferId, DeviceBackend, MeshBufferId, ResourceKey, TextureId};

/// Work scheduled onto the device thread with [`super::RenderDevice::execute`].
pub type DeviceTask = Box<dyn FnOnce(&mut dyn DeviceBackend) + Send + 'static>;

/// One unit of work for the device thread.
///
/// Commands carry resource ids and owned payloads only. The device thread
/// applies them strictly in the order they were submitted.
pub enum DeviceCommand {
    CreateTexture(TextureId),
    Texture(TextureId, TextureCommand),
    CreateBuffer(BufferId),
    Buffer(BufferId, BufferCommand),
    CreateMeshBuffer(MeshBufferId),
    MeshBuffer(MeshBufferId, MeshBufferCommand),
    Release(ResourceKey),

    /// New back-buffer size in physical pixels.
    Resize(Size2),
    /// Clear parameters of the default frame buffer.
    SetFrameClear(ClearState),
    /// Values used for texture samplers left at their defaults.
    SetSamplerDefaults(SamplerDefaults),
    Draw(DrawCall),
    Present,

    Execute(DeviceTask),
    /// Stops the worker after everything queued before it.
    Shutdown,
}

impl fmt::Debug for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTexture(id) => f.debug_tuple("CreateTexture").field(id).finish(),
            Self::Texture(id, c) => f.debug_tuple("Texture").field(id).field(c).finish(),
            Self::CreateBuffer(id) => f.debug_tuple("CreateBuffer").field(id).finish(),
            Self::Buffer(id, c) => f.debug_tuple("Buffer").field(id).field(c).finish(),
            Self::CreateMeshBuffer(id) => f.debug_tuple("CreateMeshBuffer").field(id).finish(),
            Self::MeshBuffer(id, c) => f.debug_tuple("MeshBuffer").field(id).field(c).finish(),
            Self::Release(key) => f.debug_tuple("Release").field(key).finish(),
            Self::Resize(size) => f.debug_tuple("Resize").field(size).finish(),
            Self::SetFrameClear(c) => f.debug_tuple("SetFrameClear").field(c).finish(),
            Self::SetSamplerDefaults(d) => f.debug_tuple("SetSamplerDefaults").field(d).finish(),
            Self::Draw(call) => f.debug_tuple("Draw").field(call).finish(),
            Self::Present => f.write_str("Present"),
            Self::Execute(_) => f.write_str("Execute(..)"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Full (re)initialization payload of a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInit {
    pub state: TextureState,
    /// Pixel data per mip level. Empty for storage-only textures (render targets).
    pub levels: Vec<MipLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureCommand {
    Init(TextureInit),
    SetSize(Size2),
    SetData { data: Vec<u8>, size: Size2 },
    SetFilter(SamplerFilter),
    SetAddressX(SamplerAddressMode),
    SetAddressY(SamplerAddressMode),
    SetMaxAnisotropy(u32),
    SetClearColorBuffer(bool),
    SetClearDepthBuffer(bool),
    SetClearColor(Color),
    SetClearDepth(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BufferCommand {
    Init { usage: BufferUsage, flags: BufferFlags, data: Vec<u8> },
    SetData(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshBufferCommand {
    Init(MeshBufferState),
    SetIndexSize(u32),
    SetIndexBuffer(Option<BufferId>),
    SetVertexAttributes(Vec<VertexAttribute>),
    SetVertexBuffer(Option<BufferId>),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// Fixed-function state of a draw call.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct PipelineState {
    pub depth_write: bool,
    pub depth_test: bool,
    pub wireframe: bool,
    /// Scissor rectangle in viewport pixels, `None` disables the scissor test.
    pub scissor: Option<Rect>,
}

/// A single recorded draw, resolved against the device tables when executed.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub mesh_buffer: MeshBufferId,
    pub textures: Vec<TextureId>,
    /// `None` targets the back buffer.
    pub render_target: Option<TextureId>,
    pub viewport: Rect,
    /// Model-view-projection matrix.
    pub transform: Mat4,
    pub color: Color,
    pub topology: PrimitiveTopology,
    pub start_index: u32,
    /// `0` draws every index of the mesh buffer.
    pub index_count: u32,
    pub pipeline: PipelineState,
}

impl DrawCall {
    pub fn new(mesh_buffer: MeshBufferId) -> Self {
        Self {
            mesh_buffer,
            textures: Vec::new(),
            render_target: None,
            viewport: Rect::default(),
            transform: Mat4::IDENTITY,
            color: Color::WHITE,
            topology: PrimitiveTopology::default(),
            start_index: 0,
            index_count: 0,
            pipeline: PipelineState::default(),
        }
    }

    /// Every resource id this call reads, for use-after-free checks.
    pub fn resources(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        std::iter::once(ResourceKey::MeshBuffer(self.mesh_buffer))
            .chain(self.textures.iter().copied().map(ResourceKey::Texture))
            .chain(self.render_target.map(ResourceKey::Texture))
    }
}

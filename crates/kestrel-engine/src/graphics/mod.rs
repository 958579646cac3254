//! Graphics front-end: texture, buffer and mesh buffer handles plus the renderer.
//!
//! Handles are owned by the application thread. Each keeps a cache of its
//! logical state that answers getters immediately, and forwards every change
//! to the device thread as a command naming the resource by id.

mod buffer;
mod format;
pub mod image;
mod mesh_buffer;
pub mod mipmap;
mod renderer;
mod sampler;
mod texture;
mod vertex;

pub use buffer::{Buffer, BufferFlags, BufferUsage};
pub use format::PixelFormat;
pub use image::{ImageCrateDecoder, ImageData, ImageDecoder};
pub use mesh_buffer::{MeshBuffer, MeshBufferState};
pub use renderer::{Renderer, RendererConfig, RendererMode};
pub use sampler::{SamplerAddressMode, SamplerDefaults, SamplerFilter, SamplerState};
pub use texture::{ClearState, MipLevel, Texture, TextureFlags, TextureState};
pub use vertex::{
    DEFAULT_VERTEX_ATTRIBUTES, DataType, Vertex, VertexAttribute, VertexSemantic, validate_attributes,
    vertex_stride,
};

use rustc_hash::FxHashMap;

use crate::graphics::mipmap;
use crate::graphics::{
    BufferFlags, BufferUsage, ClearState, MeshBufferState, MipLevel, SamplerDefaults, SamplerState,
    TextureFlags, TextureState, vertex_stride,
};

use super::command::{BufferCommand, DrawCall, MeshBufferCommand, TextureCommand, TextureInit};
use super::{BufferId, DeviceBackend, DeviceError, DeviceResult, MeshBufferId, ResourceKey, TextureId};

/// Device-side copy of a texture.
#[derive(Debug, Default)]
pub(crate) struct TextureResource {
    pub(crate) state: TextureState,
    pub(crate) levels: Vec<MipLevel>,
}

#[derive(Debug, Default)]
pub(crate) struct BufferResource {
    /// `None` until the first successful init.
    pub(crate) usage: Option<BufferUsage>,
    pub(crate) flags: BufferFlags,
    pub(crate) data: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct MeshBufferResource {
    pub(crate) state: MeshBufferState,
}

/// Resource tables owned by the device thread.
///
/// Each `apply_*` builds the next state, hands it to the backend and commits it
/// only when the backend accepted it.
#[derive(Debug, Default)]
pub(crate) struct ResourceTables {
    pub(crate) textures: FxHashMap<TextureId, TextureResource>,
    pub(crate) buffers: FxHashMap<BufferId, BufferResource>,
    pub(crate) mesh_buffers: FxHashMap<MeshBufferId, MeshBufferResource>,
    /// Fills in deferred sampler fields before they reach the backend. The
    /// tables keep what the texture asked for.
    pub(crate) sampler_defaults: SamplerDefaults,
}

impl ResourceTables {
    pub(crate) fn contains(&self, key: ResourceKey) -> bool {
        match key {
            ResourceKey::Texture(id) => self.textures.contains_key(&id),
            ResourceKey::Buffer(id) => self.buffers.contains_key(&id),
            ResourceKey::MeshBuffer(id) => self.mesh_buffers.contains_key(&id),
        }
    }

    // ── creation / release ────────────────────────────────────────────────

    pub(crate) fn create_texture(&mut self, id: TextureId, backend: &mut dyn DeviceBackend) -> DeviceResult<()> {
        if self.textures.contains_key(&id) {
            return Err(DeviceError::DuplicateResource(ResourceKey::Texture(id)));
        }
        backend.create_texture(id)?;
        self.textures.insert(id, TextureResource::default());
        Ok(())
    }

    pub(crate) fn create_buffer(&mut self, id: BufferId, backend: &mut dyn DeviceBackend) -> DeviceResult<()> {
        if self.buffers.contains_key(&id) {
            return Err(DeviceError::DuplicateResource(ResourceKey::Buffer(id)));
        }
        backend.create_buffer(id)?;
        self.buffers.insert(id, BufferResource::default());
        Ok(())
    }

    pub(crate) fn create_mesh_buffer(&mut self, id: MeshBufferId, backend: &mut dyn DeviceBackend) -> DeviceResult<()> {
        if self.mesh_buffers.contains_key(&id) {
            return Err(DeviceError::DuplicateResource(ResourceKey::MeshBuffer(id)));
        }
        backend.create_mesh_buffer(id)?;
        self.mesh_buffers.insert(id, MeshBufferResource::default());
        Ok(())
    }

    pub(crate) fn release(&mut self, key: ResourceKey, backend: &mut dyn DeviceBackend) -> DeviceResult<()> {
        let removed = match key {
            ResourceKey::Texture(id) => self.textures.remove(&id).map(|_| backend.destroy_texture(id)),
            ResourceKey::Buffer(id) => self.buffers.remove(&id).map(|_| backend.destroy_buffer(id)),
            ResourceKey::MeshBuffer(id) => self.mesh_buffers.remove(&id).map(|_| backend.destroy_mesh_buffer(id)),
        };
        removed.ok_or(DeviceError::UnknownResource(key))
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub(crate) fn apply_texture(
        &mut self,
        id: TextureId,
        command: TextureCommand,
        backend: &mut dyn DeviceBackend,
    ) -> DeviceResult<()> {
        let key = ResourceKey::Texture(id);
        let defaults = self.sampler_defaults;
        let texture = self.textures.get_mut(&id).ok_or(DeviceError::UnknownResource(key))?;

        match command {
            TextureCommand::Init(TextureInit { state, levels }) => {
                let levels = build_levels(key, &state, levels)?;
                backend.upload_texture(id, &resolved(&state, defaults), &levels)?;
                texture.state = state;
                texture.levels = levels;
            }
            TextureCommand::SetSize(size) => {
                let next = TextureState { size, ..texture.state.clone() };
                backend.upload_texture(id, &resolved(&next, defaults), &[])?;
                texture.state = next;
                texture.levels.clear();
            }
            TextureCommand::SetData { data, size } => {
                let next = TextureState { size, ..texture.state.clone() };
                let (width, height) = size.to_extent();
                let levels = build_levels(key, &next, vec![MipLevel { width, height, data }])?;
                backend.upload_texture(id, &resolved(&next, defaults), &levels)?;
                texture.state = next;
                texture.levels = levels;
            }
            TextureCommand::SetFilter(filter) => {
                let sampler = SamplerState { filter, ..texture.state.sampler };
                backend.configure_sampler(id, &sampler.resolve(defaults))?;
                texture.state.sampler = sampler;
            }
            TextureCommand::SetAddressX(address_x) => {
                let sampler = SamplerState { address_x, ..texture.state.sampler };
                backend.configure_sampler(id, &sampler.resolve(defaults))?;
                texture.state.sampler = sampler;
            }
            TextureCommand::SetAddressY(address_y) => {
                let sampler = SamplerState { address_y, ..texture.state.sampler };
                backend.configure_sampler(id, &sampler.resolve(defaults))?;
                texture.state.sampler = sampler;
            }
            TextureCommand::SetMaxAnisotropy(max_anisotropy) => {
                let sampler = SamplerState { max_anisotropy, ..texture.state.sampler };
                backend.configure_sampler(id, &sampler.resolve(defaults))?;
                texture.state.sampler = sampler;
            }
            TextureCommand::SetClearColorBuffer(color_buffer) => {
                let clear = ClearState { color_buffer, ..texture.state.clear };
                backend.configure_clear(id, &clear)?;
                texture.state.clear = clear;
            }
            TextureCommand::SetClearDepthBuffer(depth_buffer) => {
                let clear = ClearState { depth_buffer, ..texture.state.clear };
                backend.configure_clear(id, &clear)?;
                texture.state.clear = clear;
            }
            TextureCommand::SetClearColor(color) => {
                let clear = ClearState { color, ..texture.state.clear };
                backend.configure_clear(id, &clear)?;
                texture.state.clear = clear;
            }
            TextureCommand::SetClearDepth(depth) => {
                let clear = ClearState { depth, ..texture.state.clear };
                backend.configure_clear(id, &clear)?;
                texture.state.clear = clear;
            }
        }
        Ok(())
    }

    // ── buffers ───────────────────────────────────────────────────────────

    pub(crate) fn apply_buffer(
        &mut self,
        id: BufferId,
        command: BufferCommand,
        backend: &mut dyn DeviceBackend,
    ) -> DeviceResult<()> {
        let key = ResourceKey::Buffer(id);
        let buffer = self.buffers.get_mut(&id).ok_or(DeviceError::UnknownResource(key))?;

        match command {
            BufferCommand::Init { usage, flags, data } => {
                backend.upload_buffer(id, usage, flags, &data)?;
                buffer.usage = Some(usage);
                buffer.flags = flags;
                buffer.data = data;
            }
            BufferCommand::SetData(data) => {
                let Some(usage) = buffer.usage else {
                    return Err(invalid(key, "buffer is not initialized"));
                };
                if !buffer.flags.contains(BufferFlags::DYNAMIC) {
                    return Err(invalid(key, "buffer is not dynamic"));
                }
                backend.upload_buffer(id, usage, buffer.flags, &data)?;
                buffer.data = data;
            }
        }
        Ok(())
    }

    // ── mesh buffers ──────────────────────────────────────────────────────

    pub(crate) fn apply_mesh_buffer(
        &mut self,
        id: MeshBufferId,
        command: MeshBufferCommand,
        backend: &mut dyn DeviceBackend,
    ) -> DeviceResult<()> {
        let key = ResourceKey::MeshBuffer(id);
        let current = &self
            .mesh_buffers
            .get(&id)
            .ok_or(DeviceError::UnknownResource(key))?
            .state;

        let next = match command {
            MeshBufferCommand::Init(state) => state,
            MeshBufferCommand::SetIndexSize(index_size) => MeshBufferState { index_size, ..current.clone() },
            MeshBufferCommand::SetIndexBuffer(index_buffer) => MeshBufferState { index_buffer, ..current.clone() },
            MeshBufferCommand::SetVertexAttributes(vertex_attributes) => MeshBufferState {
                vertex_stride: vertex_stride(&vertex_attributes),
                vertex_attributes,
                ..current.clone()
            },
            MeshBufferCommand::SetVertexBuffer(vertex_buffer) => MeshBufferState { vertex_buffer, ..current.clone() },
        };

        if !matches!(next.index_size, 0 | 2 | 4) {
            return Err(invalid(key, format!("index size {} is not 2 or 4", next.index_size)));
        }
        self.check_mesh_buffers(&next)?;

        backend.configure_mesh_buffer(id, &next)?;
        if let Some(mesh) = self.mesh_buffers.get_mut(&id) {
            mesh.state = next;
        }
        Ok(())
    }

    // ── draw ──────────────────────────────────────────────────────────────

    /// Bound index and vertex buffers must still be alive.
    fn check_mesh_buffers(&self, state: &MeshBufferState) -> DeviceResult<()> {
        for buffer in [state.index_buffer, state.vertex_buffer].into_iter().flatten() {
            if !self.buffers.contains_key(&buffer) {
                return Err(DeviceError::UnknownResource(ResourceKey::Buffer(buffer)));
            }
        }
        Ok(())
    }

    pub(crate) fn check_draw(&self, call: &DrawCall) -> DeviceResult<()> {
        if let Some(missing) = call.resources().find(|key| !self.contains(*key)) {
            return Err(DeviceError::UnknownResource(missing));
        }
        if let Some(mesh) = self.mesh_buffers.get(&call.mesh_buffer) {
            self.check_mesh_buffers(&mesh.state)?;
        }
        if let Some(target) = call.render_target {
            let is_target = self
                .textures
                .get(&target)
                .is_some_and(|t| t.state.flags.contains(TextureFlags::RENDER_TARGET));
            if !is_target {
                return Err(invalid(ResourceKey::Texture(target), "texture is not a render target"));
            }
        }
        Ok(())
    }
}

fn invalid(key: ResourceKey, reason: impl Into<String>) -> DeviceError {
    DeviceError::InvalidOperation { key, reason: reason.into() }
}

fn resolved(state: &TextureState, defaults: SamplerDefaults) -> TextureState {
    TextureState { sampler: state.sampler.resolve(defaults), ..state.clone() }
}

/// Checks uploaded levels against the texture layout and expands a single base
/// level into a mip chain when requested.
fn build_levels(key: ResourceKey, state: &TextureState, levels: Vec<MipLevel>) -> DeviceResult<Vec<MipLevel>> {
    if levels.is_empty() {
        return Ok(levels);
    }
    mipmap::validate_levels(state.format, &levels).map_err(|err| invalid(key, err.to_string()))?;
    let (width, height) = state.size.to_extent();
    if (levels[0].width, levels[0].height) != (width, height) {
        return Err(invalid(
            key,
            format!("base level is {}x{}, texture is {width}x{height}", levels[0].width, levels[0].height),
        ));
    }

    let wants_chain = state.flags.contains(TextureFlags::GENERATE_MIPMAPS) && state.mip_levels > 1;
    match levels.as_slice() {
        [base] if wants_chain => {
            if !state.format.is_unorm8() {
                log::warn!("{key}: mipmap generation is not supported for {:?}", state.format);
                return Ok(levels);
            }
            Ok(mipmap::generate_chain(state.format, base, state.mip_levels))
        }
        _ => Ok(levels),
    }
}

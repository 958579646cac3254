use std::sync::Arc;

use anyhow::{Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::coords::Rect;
use crate::device::command::DrawCall;
use crate::device::{
    BufferId, DeviceBackend, DeviceError, DeviceResult, MeshBufferId, ResourceKey, TextureId,
};
use crate::graphics::{
    BufferFlags, BufferUsage, ClearState, MeshBufferState, MipLevel, SamplerState, TextureFlags,
    TextureState,
};

use super::pipeline::{self, DrawUniform, MeshPipelines, PipelineKey};
use super::surface::{self, SurfaceErrorAction};
use super::{GpuInit, convert};

/// Native objects behind one texture id.
#[derive(Default)]
struct GpuTexture {
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    sampler: Option<wgpu::Sampler>,
    /// Sampling bind group, rebuilt after an upload or sampler change.
    bind_group: Option<wgpu::BindGroup>,
    clear: ClearState,
}

/// Per-frame recording state. Created lazily by the first draw.
#[derive(Default)]
struct FrameState {
    encoder: Option<wgpu::CommandEncoder>,
    surface: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
    /// Targets already cleared this frame; `None` is the back buffer.
    cleared: FxHashSet<Option<TextureId>>,
    draws: u32,
}

/// Color target a draw renders into.
struct Target {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    sample_count: u32,
    size: (u32, u32),
}

/// [`DeviceBackend`] on top of wgpu, presenting into a winit window.
///
/// Each target is cleared by its first use in a frame. Draws then load it and
/// render the mesh with the first bound texture, tinted by the call color.
pub struct WgpuBackend {
    window: Arc<Window>,
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    _adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    textures: FxHashMap<TextureId, GpuTexture>,
    buffers: FxHashMap<BufferId, Option<wgpu::Buffer>>,
    meshes: FxHashMap<MeshBufferId, MeshBufferState>,
    pipelines: MeshPipelines,

    frame_clear: ClearState,
    frame: FrameState,
}

impl WgpuBackend {
    /// Creates the wgpu device and a surface bound to `window`.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let GpuInit {
            backends,
            power_preference,
            prefer_srgb,
            present_mode,
            alpha_mode,
            required_features,
            required_limits,
            desired_maximum_frame_latency,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("kestrel device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, prefer_srgb)
            .context("no supported surface formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: surface::choose_alpha_mode(&caps, alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        log::info!(
            "wgpu backend ready: {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            size.width,
            size.height
        );

        let pipelines = MeshPipelines::new(&device, &queue);

        Ok(Self {
            window,
            _instance: instance,
            surface,
            _adapter: adapter,
            device,
            queue,
            config,
            textures: FxHashMap::default(),
            buffers: FxHashMap::default(),
            meshes: FxHashMap::default(),
            pipelines,
            frame_clear: ClearState::default(),
            frame: FrameState::default(),
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn texture_mut(&mut self, id: TextureId) -> DeviceResult<&mut GpuTexture> {
        self.textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownResource(ResourceKey::Texture(id)))
    }

    fn create_sampler(&self, sampler: &SamplerState) -> wgpu::Sampler {
        let filter = convert::filter_mode(sampler.filter);
        let mipmap_filter = convert::mipmap_filter_mode(sampler.filter);

        // wgpu only accepts a clamp above 1 when every filter is linear.
        let all_linear = filter == wgpu::FilterMode::Linear && mipmap_filter == wgpu::MipmapFilterMode::Linear;
        let anisotropy_clamp = if all_linear {
            sampler.max_anisotropy.clamp(1, 16) as u16
        } else {
            if sampler.max_anisotropy > 1 {
                log::debug!("anisotropy {} needs trilinear filtering, using 1", sampler.max_anisotropy);
            }
            1
        };

        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kestrel sampler"),
            address_mode_u: convert::address_mode(sampler.address_x),
            address_mode_v: convert::address_mode(sampler.address_y),
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter,
            anisotropy_clamp,
            ..Default::default()
        })
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.frame.encoder.get_or_insert_with(|| {
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kestrel frame encoder"),
            })
        })
    }

    /// Acquires the surface texture for this frame. `Ok(false)` skips the frame.
    fn acquire_surface(&mut self) -> DeviceResult<bool> {
        if self.frame.surface.is_some() {
            return Ok(true);
        }

        match self.surface.get_current_texture() {
            Ok(surface_texture) => {
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.frame.surface = Some((surface_texture, view));
                Ok(true)
            }
            Err(err) => {
                match surface::map_surface_error(&self.surface, &self.device, &self.config, err) {
                    SurfaceErrorAction::Fatal => Err(DeviceError::SurfaceLost),
                    action => {
                        log::debug!("surface unavailable ({action:?}), skipping frame");
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Encodes a clear pass on `target` once per frame.
    fn clear_target(&mut self, target: Option<TextureId>) -> DeviceResult<()> {
        if self.frame.cleared.contains(&target) {
            return Ok(());
        }

        let (view, clear) = match target {
            Some(id) => {
                let texture = self.textures.get(&id).ok_or(DeviceError::UnknownResource(
                    ResourceKey::Texture(id),
                ))?;
                let (Some(native), Some(view)) = (&texture.texture, &texture.view) else {
                    return Err(DeviceError::Backend(format!("{id} has no storage")));
                };
                if !native.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
                    return Err(DeviceError::Backend(format!("{id} is not a render target")));
                }
                if native.format().is_depth_stencil_format() {
                    // Depth targets are not attached by this backend.
                    return Ok(());
                }
                (view.clone(), texture.clear)
            }
            None => {
                if !self.acquire_surface()? {
                    return Ok(());
                }
                let Some((_, view)) = self.frame.surface.as_ref() else {
                    return Ok(());
                };
                (view.clone(), self.frame_clear)
            }
        };

        let load = if clear.color_buffer {
            wgpu::LoadOp::Clear(convert::clear_color(clear.color))
        } else {
            wgpu::LoadOp::Load
        };

        {
            let _pass = self.encoder().begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kestrel clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        self.frame.cleared.insert(target);
        Ok(())
    }

    /// Color target for a draw. `None` when there is nothing to draw into.
    fn target(&self, target: Option<TextureId>) -> DeviceResult<Option<Target>> {
        match target {
            Some(id) => {
                let texture = self.textures.get(&id).ok_or(DeviceError::UnknownResource(
                    ResourceKey::Texture(id),
                ))?;
                let (Some(native), Some(view)) = (&texture.texture, &texture.view) else {
                    return Ok(None);
                };
                if native.format().is_depth_stencil_format() {
                    return Ok(None);
                }
                Ok(Some(Target {
                    view: view.clone(),
                    format: native.format(),
                    sample_count: native.sample_count(),
                    size: (native.width(), native.height()),
                }))
            }
            None => Ok(self.frame.surface.as_ref().map(|(_, view)| Target {
                view: view.clone(),
                format: self.config.format,
                sample_count: 1,
                size: (self.config.width, self.config.height),
            })),
        }
    }

    /// Builds the sampling bind group of `id` if the texture can be sampled.
    fn prepare_texture(&mut self, id: TextureId) -> DeviceResult<bool> {
        let features = self.device.features();
        let entry = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownResource(ResourceKey::Texture(id)))?;
        if entry.bind_group.is_some() {
            return Ok(true);
        }

        let (Some(native), Some(view), Some(sampler)) = (&entry.texture, &entry.view, &entry.sampler) else {
            return Ok(false);
        };
        let filterable = native.format().sample_type(None, Some(features))
            == Some(wgpu::TextureSampleType::Float { filterable: true });
        if native.sample_count() > 1 || !filterable {
            log::debug!("{id} cannot be sampled ({:?}), drawing untextured", native.format());
            return Ok(false);
        }

        let group = self.pipelines.texture_group(&self.device, view, sampler);
        entry.bind_group = Some(group);
        Ok(true)
    }

    fn native_buffer(&self, id: BufferId) -> DeviceResult<Option<&wgpu::Buffer>> {
        self.buffers
            .get(&id)
            .map(Option::as_ref)
            .ok_or(DeviceError::UnknownResource(ResourceKey::Buffer(id)))
    }

    /// Byte size of `id`, checking it was created for `usage`. `None` when empty.
    fn buffer_size(&self, id: BufferId, usage: wgpu::BufferUsages) -> DeviceResult<Option<u64>> {
        let Some(buffer) = self.native_buffer(id)? else {
            return Ok(None);
        };
        if !buffer.usage().contains(usage) {
            return Err(DeviceError::Backend(format!("{id} cannot be bound as {usage:?}")));
        }
        Ok(Some(buffer.size()))
    }
}

/// Viewport clamped to the target, in pixels. A zero-sized viewport covers it.
fn viewport_rect(viewport: Rect, (tw, th): (u32, u32)) -> Option<(f32, f32, f32, f32)> {
    let (tw, th) = (tw as f32, th as f32);
    let r = if viewport.is_empty() { Rect::new(0.0, 0.0, tw, th) } else { viewport.normalized() };
    let x = r.origin.x.clamp(0.0, tw);
    let y = r.origin.y.clamp(0.0, th);
    let w = (r.origin.x + r.size.x).min(tw) - x;
    let h = (r.origin.y + r.size.y).min(th) - y;
    (w > 0.0 && h > 0.0).then_some((x, y, w, h))
}

impl DeviceBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_texture(&mut self, id: TextureId) -> DeviceResult<()> {
        self.textures.insert(id, GpuTexture::default());
        Ok(())
    }

    fn upload_texture(&mut self, id: TextureId, state: &TextureState, levels: &[MipLevel]) -> DeviceResult<()> {
        let (width, height) = state.size.to_extent();
        let max_dim = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max_dim || height > max_dim {
            return Err(DeviceError::Backend(format!("{id}: unsupported size {width}x{height}")));
        }

        let render_target = state.flags.contains(TextureFlags::RENDER_TARGET);
        let format = convert::texture_format(state.format);
        if render_target
            && !format
                .guaranteed_format_features(self.device.features())
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return Err(DeviceError::Backend(format!("{id}: {format:?} cannot be rendered to")));
        }
        if state.sample_count > 1 && !render_target {
            return Err(DeviceError::Backend(format!("{id}: multisampling requires a render target")));
        }

        let max_mips = 32 - width.max(height).leading_zeros();
        let mip_level_count = if levels.is_empty() { state.mip_levels } else { levels.len() as u32 };
        let mip_level_count = if state.sample_count > 1 { 1 } else { mip_level_count.clamp(1, max_mips) };

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kestrel texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count,
            sample_count: state.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        // Depth and multisampled storage is only ever written by render passes.
        let writable = state.sample_count == 1 && !format.is_depth_stencil_format();
        let levels = if writable { levels } else { &[] };

        let bpp = state.format.bytes_per_pixel() as u32;
        for (mip_level, level) in levels.iter().take(mip_level_count as usize).enumerate() {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &level.data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.width * bpp),
                    rows_per_image: Some(level.height),
                },
                wgpu::Extent3d { width: level.width, height: level.height, depth_or_array_layers: 1 },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.create_sampler(&state.sampler);

        let entry = self.texture_mut(id)?;
        entry.texture = Some(texture);
        entry.view = Some(view);
        entry.sampler = Some(sampler);
        entry.bind_group = None;
        entry.clear = state.clear;
        Ok(())
    }

    fn configure_sampler(&mut self, id: TextureId, sampler: &SamplerState) -> DeviceResult<()> {
        let created = self.create_sampler(sampler);
        let entry = self.texture_mut(id)?;
        entry.sampler = Some(created);
        entry.bind_group = None;
        Ok(())
    }

    fn configure_clear(&mut self, id: TextureId, clear: &ClearState) -> DeviceResult<()> {
        self.texture_mut(id)?.clear = *clear;
        Ok(())
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if let Some(GpuTexture { texture: Some(texture), .. }) = self.textures.remove(&id) {
            texture.destroy();
        }
    }

    fn create_buffer(&mut self, id: BufferId) -> DeviceResult<()> {
        self.buffers.insert(id, None);
        Ok(())
    }

    fn upload_buffer(&mut self, id: BufferId, usage: BufferUsage, _flags: BufferFlags, data: &[u8]) -> DeviceResult<()> {
        let buffer = (!data.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kestrel buffer"),
                contents: data,
                usage: convert::buffer_usages(usage),
            })
        });

        let slot = self
            .buffers
            .get_mut(&id)
            .ok_or(DeviceError::UnknownResource(ResourceKey::Buffer(id)))?;
        if let Some(old) = std::mem::replace(slot, buffer) {
            old.destroy();
        }
        Ok(())
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if let Some(Some(buffer)) = self.buffers.remove(&id) {
            buffer.destroy();
        }
    }

    fn create_mesh_buffer(&mut self, id: MeshBufferId) -> DeviceResult<()> {
        self.meshes.insert(id, MeshBufferState::default());
        Ok(())
    }

    fn configure_mesh_buffer(&mut self, id: MeshBufferId, state: &MeshBufferState) -> DeviceResult<()> {
        self.meshes.insert(id, state.clone());
        Ok(())
    }

    fn destroy_mesh_buffer(&mut self, id: MeshBufferId) {
        self.meshes.remove(&id);
    }

    fn resize(&mut self, width: u32, height: u32) -> DeviceResult<()> {
        // A pending surface texture belongs to the old configuration.
        self.frame.surface = None;
        if !surface::apply_resize(&self.surface, &self.device, &mut self.config, width, height) {
            log::debug!("deferring surface configuration for {width}x{height}");
        }
        Ok(())
    }

    fn set_frame_clear(&mut self, clear: &ClearState) -> DeviceResult<()> {
        self.frame_clear = *clear;
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> DeviceResult<()> {
        let mesh = self.meshes.get(&call.mesh_buffer).ok_or(DeviceError::UnknownResource(
            ResourceKey::MeshBuffer(call.mesh_buffer),
        ))?;
        let Some(vertex_id) = mesh.vertex_buffer else {
            return Err(DeviceError::Backend(format!("{} has no vertex buffer", call.mesh_buffer)));
        };
        let index = match (mesh.index_buffer, pipeline::index_format(mesh.index_size)) {
            (Some(id), Some(format)) => Some((id, format)),
            _ => None,
        };
        let index_size = if index.is_some() { mesh.index_size } else { 0 };
        let attributes = mesh.vertex_attributes.clone();
        let stride = mesh.vertex_stride;

        self.clear_target(call.render_target)?;
        self.frame.draws += 1;

        let Some(target) = self.target(call.render_target)? else {
            return Ok(());
        };
        let Some((sx, sy, sw, sh)) = pipeline::scissor_rect(call.pipeline.scissor, target.size) else {
            return Ok(());
        };
        let Some((vx, vy, vw, vh)) = viewport_rect(call.viewport, target.size) else {
            return Ok(());
        };
        if call.pipeline.wireframe {
            log::trace!("wireframe is not supported by the mesh pipeline, drawing filled");
        }

        let key = PipelineKey {
            format: target.format,
            sample_count: target.sample_count,
            topology: call.topology,
            index_size,
            attributes,
            stride,
        };
        self.pipelines.ensure(&self.device, &key)?;

        // A texture cannot be sampled while it is the attachment.
        let texture = call.textures.first().copied().filter(|id| Some(*id) != call.render_target);
        let textured = match texture {
            Some(id) => self.prepare_texture(id)?,
            None => false,
        };

        let Some(vertex_size) = self.buffer_size(vertex_id, wgpu::BufferUsages::VERTEX)? else {
            return Ok(());
        };
        let total = match index {
            Some((id, _)) => match self.buffer_size(id, wgpu::BufferUsages::INDEX)? {
                Some(size) => size / u64::from(index_size),
                None => return Ok(()),
            },
            None => vertex_size / u64::from(stride.max(1)),
        };

        let start = u64::from(call.start_index);
        let count = if call.index_count == 0 { total.saturating_sub(start) } else { u64::from(call.index_count) };
        if start + count > total {
            return Err(DeviceError::Backend(format!(
                "draw range {start}..{} exceeds the {total} elements of {}",
                start + count,
                call.mesh_buffer
            )));
        }
        if count == 0 {
            return Ok(());
        }
        let range = start as u32..(start + count) as u32;

        let uniform = DrawUniform::new(call.transform, call.color);
        let offset = self.pipelines.push_uniform(&self.device, &self.queue, uniform);

        // Field borrows only, so the frame encoder can be taken below.
        let Some(vertex) = self.buffers.get(&vertex_id).and_then(Option::as_ref) else {
            return Ok(());
        };
        let index = index.and_then(|(id, format)| {
            self.buffers.get(&id).and_then(Option::as_ref).map(|buffer| (buffer, format))
        });
        let Some(render_pipeline) = self.pipelines.get(&key) else {
            return Ok(());
        };
        let texture_group = texture
            .filter(|_| textured)
            .and_then(|id| self.textures.get(&id))
            .and_then(|t| t.bind_group.as_ref())
            .unwrap_or(self.pipelines.white());

        let device = &self.device;
        let mut encoder = self.frame.encoder.take().unwrap_or_else(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("kestrel frame encoder") })
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kestrel mesh pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(render_pipeline);
            pass.set_bind_group(0, self.pipelines.draw_group(), &[offset]);
            pass.set_bind_group(1, texture_group, &[]);
            pass.set_vertex_buffer(0, vertex.slice(..));
            pass.set_vertex_buffer(1, self.pipelines.defaults().slice(..));
            pass.set_viewport(vx, vy, vw, vh, 0.0, 1.0);
            pass.set_scissor_rect(sx, sy, sw, sh);

            match index {
                Some((buffer, format)) => {
                    pass.set_index_buffer(buffer.slice(..), format);
                    pass.draw_indexed(range, 0, 0..1);
                }
                None => pass.draw(range, 0..1),
            }
        }
        self.frame.encoder = Some(encoder);
        Ok(())
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.clear_target(None)?;

        let frame = std::mem::take(&mut self.frame);
        self.pipelines.end_frame();
        if let Some(encoder) = frame.encoder {
            self.queue.submit(std::iter::once(encoder.finish()));
        }

        if let Some((surface_texture, view)) = frame.surface {
            self.window.pre_present_notify();
            drop(view);
            surface_texture.present();
        }

        log::trace!("frame presented ({} draws)", frame.draws);
        Ok(())
    }
}

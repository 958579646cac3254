use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;
use wgpu::util::DeviceExt;

use crate::coords::{Mat4, Rect};
use crate::device::{DeviceError, DeviceResult, PrimitiveTopology};
use crate::graphics::{DataType, VertexAttribute, VertexSemantic};
use crate::paint::Color;

// ── uniforms ──────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct DrawUniform {
    mvp: [[f32; 4]; 4],
    color: [f32; 4],
}

impl DrawUniform {
    pub(super) fn new(mvp: Mat4, color: Color) -> Self {
        Self { mvp: mvp.to_cols_array_2d(), color: [color.r, color.g, color.b, color.a] }
    }
}

/// Stand-ins for attributes a mesh does not provide: opaque white, uv 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DefaultAttributes {
    color: [u8; 4],
    uv: [f32; 2],
}

const LOCATION_POSITION: u32 = 0;
const LOCATION_COLOR: u32 = 1;
const LOCATION_UV: u32 = 2;

const INITIAL_UNIFORM_SLOTS: u64 = 256;
const VERTEX_ALIGN: u64 = 4;

// ── pipeline key ──────────────────────────────────────────────────────────

/// Everything a mesh pipeline depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub topology: PrimitiveTopology,
    pub index_size: u32,
    pub attributes: Vec<VertexAttribute>,
    pub stride: u32,
}

fn location(semantic: VertexSemantic) -> Option<u32> {
    match semantic {
        VertexSemantic::Position => Some(LOCATION_POSITION),
        VertexSemantic::Color => Some(LOCATION_COLOR),
        VertexSemantic::TexCoord(0) => Some(LOCATION_UV),
        _ => None,
    }
}

/// Float-readable wgpu format for an attribute, if there is one.
fn vertex_format(attribute: &VertexAttribute) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    match (attribute.data_type, attribute.components) {
        (DataType::Float, 1) => Some(F::Float32),
        (DataType::Float, 2) => Some(F::Float32x2),
        (DataType::Float, 3) => Some(F::Float32x3),
        (DataType::Float, 4) => Some(F::Float32x4),
        (DataType::UnsignedByte, 2) => Some(F::Unorm8x2),
        (DataType::UnsignedByte, 4) => Some(F::Unorm8x4),
        (DataType::Byte, 2) => Some(F::Snorm8x2),
        (DataType::Byte, 4) => Some(F::Snorm8x4),
        (DataType::UnsignedShort, 2) => Some(F::Unorm16x2),
        (DataType::UnsignedShort, 4) => Some(F::Unorm16x4),
        (DataType::Short, 2) => Some(F::Snorm16x2),
        (DataType::Short, 4) => Some(F::Snorm16x4),
        _ => None,
    }
}

/// Shader inputs found in `attributes`, with their byte offsets.
fn mesh_attributes(attributes: &[VertexAttribute]) -> Vec<wgpu::VertexAttribute> {
    let mut offset = 0u64;
    let mut out = Vec::new();
    for attribute in attributes {
        if let (Some(shader_location), Some(format)) = (location(attribute.semantic), vertex_format(attribute)) {
            if !out.iter().any(|a: &wgpu::VertexAttribute| a.shader_location == shader_location) {
                out.push(wgpu::VertexAttribute { format, offset, shader_location });
            }
        }
        offset += attribute.size() as u64;
    }
    out
}

fn topology(t: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match t {
        PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

pub(super) fn index_format(index_size: u32) -> Option<wgpu::IndexFormat> {
    match index_size {
        2 => Some(wgpu::IndexFormat::Uint16),
        4 => Some(wgpu::IndexFormat::Uint32),
        _ => None,
    }
}

fn is_strip(t: PrimitiveTopology) -> bool {
    matches!(t, PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip)
}

fn alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

/// Converts a pixel scissor rect to wgpu arguments clamped to the target.
///
/// `None` (no overlap with the target) means the draw is skipped.
pub(super) fn scissor_rect(clip: Option<Rect>, target: (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let (tw, th) = target;
    let full = Rect::new(0.0, 0.0, tw as f32, th as f32);
    let r = match clip {
        None => full,
        Some(r) => r.intersect(full)?,
    };

    let x = (r.origin.x as u32).min(tw);
    let y = (r.origin.y as u32).min(th);
    let w = ((r.origin.x + r.size.x) as u32).min(tw).saturating_sub(x);
    let h = ((r.origin.y + r.size.y) as u32).min(th).saturating_sub(y);

    if w == 0 || h == 0 { None } else { Some((x, y, w, h)) }
}

// ── pipelines ─────────────────────────────────────────────────────────────

/// Shader, layouts and per-frame uniform storage shared by every mesh draw.
pub(super) struct MeshPipelines {
    shader: wgpu::ShaderModule,
    draw_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,

    uniform_stride: u64,
    uniform_capacity: u64,
    uniform_buffer: wgpu::Buffer,
    draw_group: wgpu::BindGroup,
    next_slot: u64,

    defaults: wgpu::Buffer,
    white: wgpu::BindGroup,
}

impl MeshPipelines {
    pub(super) fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kestrel mesh shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kestrel draw bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(size_of::<DrawUniform>() as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kestrel texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kestrel mesh pipeline layout"),
            bind_group_layouts: &[&draw_layout, &texture_layout],
            immediate_size: 0,
        });

        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_stride = (size_of::<DrawUniform>() as u64).div_ceil(alignment) * alignment;
        let (uniform_buffer, draw_group) =
            create_uniforms(device, &draw_layout, uniform_stride * INITIAL_UNIFORM_SLOTS);

        let defaults = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kestrel default attributes"),
            contents: bytemuck::bytes_of(&DefaultAttributes { color: [255; 4], uv: [0.0; 2] }),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let white_texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("kestrel white texture"),
                size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255; 4],
        );
        let white_view = white_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let white_sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());
        let white = texture_group(device, &texture_layout, &white_view, &white_sampler);

        Self {
            shader,
            draw_layout,
            texture_layout,
            pipeline_layout,
            pipelines: FxHashMap::default(),
            uniform_stride,
            uniform_capacity: INITIAL_UNIFORM_SLOTS,
            uniform_buffer,
            draw_group,
            next_slot: 0,
            defaults,
            white,
        }
    }

    /// Builds the pipeline for `key` unless it is cached.
    pub(super) fn ensure(&mut self, device: &wgpu::Device, key: &PipelineKey) -> DeviceResult<()> {
        if self.pipelines.contains_key(key) {
            return Ok(());
        }

        let mesh = mesh_attributes(&key.attributes);
        if !mesh.iter().any(|a| a.shader_location == LOCATION_POSITION) {
            return Err(DeviceError::Backend("vertex layout has no float position".into()));
        }
        if u64::from(key.stride) % VERTEX_ALIGN != 0
            || mesh.iter().any(|a| a.offset % VERTEX_ALIGN != 0)
        {
            return Err(DeviceError::Backend(format!("vertex layout is not 4-byte aligned (stride {})", key.stride)));
        }

        let provided = |loc: u32| mesh.iter().any(|a| a.shader_location == loc);
        let mut fallback = Vec::new();
        if !provided(LOCATION_COLOR) {
            fallback.push(wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Unorm8x4,
                offset: 0,
                shader_location: LOCATION_COLOR,
            });
        }
        if !provided(LOCATION_UV) {
            fallback.push(wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 4,
                shader_location: LOCATION_UV,
            });
        }

        let buffers = [
            wgpu::VertexBufferLayout {
                array_stride: u64::from(key.stride),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &mesh,
            },
            wgpu::VertexBufferLayout {
                array_stride: size_of::<DefaultAttributes>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &fallback,
            },
        ];

        let blendable = key
            .format
            .guaranteed_format_features(device.features())
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE);
        let strip_index_format = if is_strip(key.topology) { index_format(key.index_size) } else { None };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("kestrel mesh pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: blendable.then(alpha_blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: topology(key.topology),
                strip_index_format,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState { count: key.sample_count, ..Default::default() },
            multiview_mask: None,
            cache: None,
        });

        log::debug!("built mesh pipeline for {:?} ({} pipelines)", key.format, self.pipelines.len() + 1);
        self.pipelines.insert(key.clone(), pipeline);
        Ok(())
    }

    pub(super) fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    /// Stores `uniform` for this frame and returns its dynamic offset.
    pub(super) fn push_uniform(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, uniform: DrawUniform) -> u32 {
        if self.next_slot == self.uniform_capacity {
            // Earlier draws keep the old buffer alive through their bind group.
            self.uniform_capacity *= 2;
            let (buffer, group) =
                create_uniforms(device, &self.draw_layout, self.uniform_stride * self.uniform_capacity);
            self.uniform_buffer = buffer;
            self.draw_group = group;
            self.next_slot = 0;
        }

        let offset = self.next_slot * self.uniform_stride;
        queue.write_buffer(&self.uniform_buffer, offset, bytemuck::bytes_of(&uniform));
        self.next_slot += 1;
        offset as u32
    }

    pub(super) fn end_frame(&mut self) {
        self.next_slot = 0;
    }

    pub(super) fn draw_group(&self) -> &wgpu::BindGroup {
        &self.draw_group
    }

    pub(super) fn defaults(&self) -> &wgpu::Buffer {
        &self.defaults
    }

    pub(super) fn white(&self) -> &wgpu::BindGroup {
        &self.white
    }

    pub(super) fn texture_group(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        texture_group(device, &self.texture_layout, view, sampler)
    }
}

fn create_uniforms(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, size: u64) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("kestrel draw uniforms"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("kestrel draw bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(size_of::<DrawUniform>() as u64),
            }),
        }],
    });
    (buffer, group)
}

fn texture_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("kestrel texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    })
}

use crate::graphics::{BufferUsage, PixelFormat, SamplerAddressMode, SamplerFilter};
use crate::paint::Color;

pub(crate) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        PixelFormat::R8Snorm => wgpu::TextureFormat::R8Snorm,
        PixelFormat::Rg8Unorm => wgpu::TextureFormat::Rg8Unorm,
        PixelFormat::Rg8Snorm => wgpu::TextureFormat::Rg8Snorm,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Rgba8Snorm => wgpu::TextureFormat::Rgba8Snorm,
        PixelFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        PixelFormat::R16Float => wgpu::TextureFormat::R16Float,
        PixelFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::R32Float => wgpu::TextureFormat::R32Float,
        PixelFormat::Rg32Float => wgpu::TextureFormat::Rg32Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        PixelFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// Mag/min filter for `filter`. Samplers arrive resolved, an unresolved
/// `Default` is treated as linear.
pub(crate) fn filter_mode(filter: SamplerFilter) -> wgpu::FilterMode {
    match filter {
        SamplerFilter::Point => wgpu::FilterMode::Nearest,
        SamplerFilter::Default | SamplerFilter::Linear | SamplerFilter::Bilinear | SamplerFilter::Trilinear => {
            wgpu::FilterMode::Linear
        }
    }
}

/// Only trilinear blends between mip levels.
pub(crate) fn mipmap_filter_mode(filter: SamplerFilter) -> wgpu::MipmapFilterMode {
    match filter {
        SamplerFilter::Trilinear => wgpu::MipmapFilterMode::Linear,
        _ => wgpu::MipmapFilterMode::Nearest,
    }
}

pub(crate) fn address_mode(mode: SamplerAddressMode) -> wgpu::AddressMode {
    match mode {
        SamplerAddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        SamplerAddressMode::Repeat => wgpu::AddressMode::Repeat,
        SamplerAddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

pub(crate) fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    let base = wgpu::BufferUsages::COPY_DST;
    match usage {
        BufferUsage::Index => base | wgpu::BufferUsages::INDEX,
        BufferUsage::Vertex => base | wgpu::BufferUsages::VERTEX,
    }
}

pub(crate) fn clear_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: color.a as f64,
    }
}

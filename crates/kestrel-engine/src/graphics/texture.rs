use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::coords::Size2;
use crate::device::command::{DeviceCommand, TextureCommand, TextureInit};
use crate::device::{DeviceId, RenderDevice, ResourceKey, TextureId};
use crate::error::{Error, Result};
use crate::paint::Color;

use super::image::{ImageCrateDecoder, ImageDecoder};
use super::mipmap;
use super::{PixelFormat, SamplerAddressMode, SamplerFilter, SamplerState};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        /// Texture can be drawn into.
        const RENDER_TARGET      = 1 << 0;
        /// Contents are expected to change often.
        const DYNAMIC            = 1 << 1;
        /// Build the mip chain from the base level on upload.
        const GENERATE_MIPMAPS   = 1 << 2;
        /// Render target that can also be sampled.
        const BIND_RENDER_TARGET = 1 << 3;
        /// Render target with an attached depth buffer.
        const DEPTH_BUFFER       = 1 << 4;
    }
}

/// How a render target (or the back buffer) is cleared at the start of a frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearState {
    pub color_buffer: bool,
    pub depth_buffer: bool,
    pub color: Color,
    pub depth: f32,
}

impl Default for ClearState {
    fn default() -> Self {
        Self {
            color_buffer: true,
            depth_buffer: false,
            color: Color::BLACK,
            depth: 1.0,
        }
    }
}

/// Tightly packed pixels of one mip level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl MipLevel {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }
}

/// Logical texture state. The front-end caches it and the device worker keeps
/// its own copy of the last state the backend accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureState {
    pub size: Size2,
    pub flags: TextureFlags,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub format: PixelFormat,
    pub sampler: SamplerState,
    pub clear: ClearState,
}

impl Default for TextureState {
    fn default() -> Self {
        Self {
            size: Size2::zero(),
            flags: TextureFlags::empty(),
            mip_levels: 1,
            sample_count: 1,
            format: PixelFormat::default(),
            sampler: SamplerState::default(),
            clear: ClearState::default(),
        }
    }
}

/// Application-side texture handle.
///
/// Getters answer from the local cache, which always holds the last requested
/// value. Setters update the cache and queue the matching device command; they
/// never wait for the device thread.
#[derive(Debug)]
pub struct Texture {
    device: RenderDevice,
    id: TextureId,
    state: TextureState,
    filename: Option<PathBuf>,
}

impl Texture {
    /// Allocates an id and schedules creation of an empty back-end texture.
    pub fn new(device: &RenderDevice) -> Self {
        let id: TextureId = device.allocate();
        device.submit(DeviceCommand::CreateTexture(id));

        Self {
            device: device.clone(),
            id,
            state: TextureState::default(),
            filename: None,
        }
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn device_id(&self) -> DeviceId {
        self.id.device()
    }

    // ── init ──────────────────────────────────────────────────────────────

    /// Storage-only texture, typically a render target.
    pub fn init(
        &mut self,
        size: Size2,
        flags: TextureFlags,
        mip_levels: u32,
        sample_count: u32,
        format: PixelFormat,
    ) -> Result<()> {
        validate_size(size)?;
        validate_counts(mip_levels, sample_count)?;

        let state = TextureState { size, flags, mip_levels, sample_count, format, ..self.state.clone() };
        self.commit_init(state, Vec::new(), None);
        Ok(())
    }

    /// Loads the file through the default image decoder.
    pub fn init_from_file(
        &mut self,
        path: impl AsRef<Path>,
        flags: TextureFlags,
        mip_levels: u32,
        format: PixelFormat,
    ) -> Result<()> {
        self.init_from_file_with(&ImageCrateDecoder, path, flags, mip_levels, format)
    }

    /// Loads the file through `decoder`. Size and format come from the decoded
    /// image; on failure nothing is created and the cache is untouched.
    pub fn init_from_file_with(
        &mut self,
        decoder: &dyn ImageDecoder,
        path: impl AsRef<Path>,
        flags: TextureFlags,
        mip_levels: u32,
        format: PixelFormat,
    ) -> Result<()> {
        let path = path.as_ref();
        validate_counts(mip_levels, 1)?;

        let image = decoder.decode(path, format)?;
        let size = Size2::from_extent(image.width, image.height);
        validate_size(size)?;
        validate_len(image.format, size, image.pixels.len())?;

        let state = TextureState {
            size,
            flags,
            mip_levels,
            sample_count: 1,
            format: image.format,
            ..self.state.clone()
        };
        let levels = vec![MipLevel::new(image.width, image.height, image.pixels)];
        self.commit_init(state, levels, Some(path.to_path_buf()));
        Ok(())
    }

    /// Uploads raw pixels for the base level.
    pub fn init_from_data(
        &mut self,
        data: Vec<u8>,
        size: Size2,
        flags: TextureFlags,
        mip_levels: u32,
        format: PixelFormat,
    ) -> Result<()> {
        validate_size(size)?;
        validate_counts(mip_levels, 1)?;
        validate_len(format, size, data.len())?;

        let (width, height) = size.to_extent();
        let state = TextureState { size, flags, mip_levels, sample_count: 1, format, ..self.state.clone() };
        self.commit_init(state, vec![MipLevel::new(width, height, data)], None);
        Ok(())
    }

    /// Uploads a pre-built mip chain; the mip count becomes `levels.len()`.
    pub fn init_from_levels(
        &mut self,
        levels: Vec<MipLevel>,
        size: Size2,
        flags: TextureFlags,
        format: PixelFormat,
    ) -> Result<()> {
        validate_size(size)?;
        mipmap::validate_levels(format, &levels)?;
        let base = &levels[0];
        if (base.width, base.height) != size.to_extent() {
            return Err(Error::InvalidSize { width: base.width as f32, height: base.height as f32 });
        }

        let state = TextureState {
            size,
            flags,
            mip_levels: levels.len() as u32,
            sample_count: 1,
            format,
            ..self.state.clone()
        };
        self.commit_init(state, levels, None);
        Ok(())
    }

    fn commit_init(&mut self, state: TextureState, levels: Vec<MipLevel>, filename: Option<PathBuf>) {
        self.state = state.clone();
        self.filename = filename;
        self.send(TextureCommand::Init(TextureInit { state, levels }));
    }

    // ── getters ───────────────────────────────────────────────────────────

    pub fn state(&self) -> &TextureState {
        &self.state
    }

    pub fn size(&self) -> Size2 {
        self.state.size
    }

    /// Source file, `None` for procedural textures.
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn flags(&self) -> TextureFlags {
        self.state.flags
    }

    pub fn mip_levels(&self) -> u32 {
        self.state.mip_levels
    }

    pub fn sample_count(&self) -> u32 {
        self.state.sample_count
    }

    pub fn format(&self) -> PixelFormat {
        self.state.format
    }

    pub fn filter(&self) -> SamplerFilter {
        self.state.sampler.filter
    }

    pub fn address_x(&self) -> SamplerAddressMode {
        self.state.sampler.address_x
    }

    pub fn address_y(&self) -> SamplerAddressMode {
        self.state.sampler.address_y
    }

    pub fn max_anisotropy(&self) -> u32 {
        self.state.sampler.max_anisotropy
    }

    pub fn clear_color_buffer(&self) -> bool {
        self.state.clear.color_buffer
    }

    pub fn clear_depth_buffer(&self) -> bool {
        self.state.clear.depth_buffer
    }

    pub fn clear_color(&self) -> Color {
        self.state.clear.color
    }

    pub fn clear_depth(&self) -> f32 {
        self.state.clear.depth
    }

    // ── setters ───────────────────────────────────────────────────────────

    /// Reallocates storage at the new size. Existing pixel data is discarded.
    pub fn set_size(&mut self, size: Size2) -> Result<()> {
        validate_size(size)?;
        self.state.size = size;
        self.send(TextureCommand::SetSize(size));
        Ok(())
    }

    /// Replaces the pixels (and size) using the current format.
    pub fn set_data(&mut self, data: Vec<u8>, size: Size2) -> Result<()> {
        validate_size(size)?;
        validate_len(self.state.format, size, data.len())?;
        self.state.size = size;
        self.send(TextureCommand::SetData { data, size });
        Ok(())
    }

    pub fn set_filter(&mut self, filter: SamplerFilter) {
        self.state.sampler.filter = filter;
        self.send(TextureCommand::SetFilter(filter));
    }

    pub fn set_address_x(&mut self, address: SamplerAddressMode) {
        self.state.sampler.address_x = address;
        self.send(TextureCommand::SetAddressX(address));
    }

    pub fn set_address_y(&mut self, address: SamplerAddressMode) {
        self.state.sampler.address_y = address;
        self.send(TextureCommand::SetAddressY(address));
    }

    pub fn set_max_anisotropy(&mut self, max_anisotropy: u32) {
        self.state.sampler.max_anisotropy = max_anisotropy;
        self.send(TextureCommand::SetMaxAnisotropy(max_anisotropy));
    }

    pub fn set_clear_color_buffer(&mut self, clear: bool) {
        self.state.clear.color_buffer = clear;
        self.send(TextureCommand::SetClearColorBuffer(clear));
    }

    pub fn set_clear_depth_buffer(&mut self, clear: bool) {
        self.state.clear.depth_buffer = clear;
        self.send(TextureCommand::SetClearDepthBuffer(clear));
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.state.clear.color = color;
        self.send(TextureCommand::SetClearColor(color));
    }

    pub fn set_clear_depth(&mut self, depth: f32) {
        self.state.clear.depth = depth;
        self.send(TextureCommand::SetClearDepth(depth));
    }

    fn send(&self, command: TextureCommand) {
        self.device.submit(DeviceCommand::Texture(self.id, command));
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.device.release(ResourceKey::Texture(self.id));
    }
}

fn validate_size(size: Size2) -> Result<()> {
    let (w, h) = size.to_extent();
    if size.is_empty() || w == 0 || h == 0 {
        return Err(Error::InvalidSize { width: size.width, height: size.height });
    }
    Ok(())
}

fn validate_counts(mip_levels: u32, sample_count: u32) -> Result<()> {
    if mip_levels == 0 {
        return Err(Error::InvalidMipLevels);
    }
    if sample_count == 0 {
        return Err(Error::InvalidSampleCount);
    }
    Ok(())
}

fn validate_len(format: PixelFormat, size: Size2, actual: usize) -> Result<()> {
    let (w, h) = size.to_extent();
    let expected = format.image_len(w, h);
    if actual != expected {
        return Err(Error::DataLengthMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::worker::DeviceWorker;
    use crate::device::{BackendOp, HeadlessBackend, HeadlessProbe};
    use crate::graphics::image::ImageData;

    fn setup() -> (RenderDevice, DeviceWorker, HeadlessProbe) {
        let (device, receiver) = RenderDevice::new();
        let backend = HeadlessBackend::new();
        let probe = backend.probe();
        (device, DeviceWorker::new(Box::new(backend), receiver), probe)
    }

    struct FixedDecoder(Option<ImageData>);

    impl ImageDecoder for FixedDecoder {
        fn decode(&self, path: &Path, _desired: PixelFormat) -> Result<ImageData> {
            self.0.clone().ok_or_else(|| Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )))
        }
    }

    // ── cache reflects last request ───────────────────────────────────────

    #[test]
    fn setters_update_cache_before_device_runs() {
        let (device, _worker, _probe) = setup();
        let mut tex = Texture::new(&device);

        tex.set_filter(SamplerFilter::Trilinear);
        tex.set_address_x(SamplerAddressMode::Repeat);
        tex.set_address_y(SamplerAddressMode::MirrorRepeat);
        tex.set_max_anisotropy(8);
        tex.set_clear_color(Color::WHITE);
        tex.set_clear_depth(0.5);
        tex.set_clear_color_buffer(false);
        tex.set_clear_depth_buffer(true);

        assert_eq!(tex.filter(), SamplerFilter::Trilinear);
        assert_eq!(tex.address_x(), SamplerAddressMode::Repeat);
        assert_eq!(tex.address_y(), SamplerAddressMode::MirrorRepeat);
        assert_eq!(tex.max_anisotropy(), 8);
        assert_eq!(tex.clear_color(), Color::WHITE);
        assert_eq!(tex.clear_depth(), 0.5);
        assert!(!tex.clear_color_buffer());
        assert!(tex.clear_depth_buffer());
        assert_eq!(device.pending(), 9);
    }

    #[test]
    fn set_size_and_set_data_update_cache_and_device() {
        let (device, mut worker, probe) = setup();
        let mut tex = Texture::new(&device);
        tex.init_from_data(vec![0; 16], Size2::new(2.0, 2.0), TextureFlags::empty(), 1, PixelFormat::Rgba8Unorm)
            .unwrap();

        tex.set_size(Size2::new(8.0, 4.0)).unwrap();
        assert_eq!(tex.size(), Size2::new(8.0, 4.0));

        tex.set_data(vec![7; 4 * 3 * 4], Size2::new(4.0, 3.0)).unwrap();
        assert_eq!(tex.size(), Size2::new(4.0, 3.0));
        assert_eq!(tex.format(), PixelFormat::Rgba8Unorm);

        worker.drain();
        let table = &worker.tables().textures[&tex.id()];
        assert_eq!(table.state.size, tex.size());
        assert_eq!(table.levels[0].data, vec![7; 48]);
        assert_eq!(
            probe.ops().last(),
            Some(&BackendOp::UploadTexture {
                id: tex.id(),
                width: 4,
                height: 3,
                format: PixelFormat::Rgba8Unorm,
                levels: 1,
            })
        );
        assert_eq!(device.stats().failed, 0);
    }

    #[test]
    fn init_keeps_sampler_settings() {
        let (device, _worker, _probe) = setup();
        let mut tex = Texture::new(&device);
        tex.set_filter(SamplerFilter::Point);
        tex.init(Size2::new(64.0, 32.0), TextureFlags::RENDER_TARGET, 1, 4, PixelFormat::Rgba8Unorm)
            .unwrap();

        assert_eq!(tex.filter(), SamplerFilter::Point);
        assert_eq!(tex.sample_count(), 4);
        assert_eq!(tex.filename(), None);
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn zero_area_is_rejected_without_changes() {
        let (device, _worker, _probe) = setup();
        let mut tex = Texture::new(&device);
        let before = device.pending();

        assert!(matches!(tex.set_size(Size2::new(0.0, 10.0)), Err(Error::InvalidSize { .. })));
        assert!(tex.init(Size2::new(4.0, 4.0), TextureFlags::empty(), 0, 1, PixelFormat::R8Unorm).is_err());
        assert!(tex.init(Size2::new(4.0, 4.0), TextureFlags::empty(), 1, 0, PixelFormat::R8Unorm).is_err());

        assert_eq!(tex.size(), Size2::zero());
        assert_eq!(device.pending(), before);
    }

    #[test]
    fn data_length_must_match_size() {
        let (device, _worker, _probe) = setup();
        let mut tex = Texture::new(&device);
        let err = tex
            .init_from_data(vec![0; 15], Size2::new(2.0, 2.0), TextureFlags::empty(), 1, PixelFormat::Rgba8Unorm)
            .unwrap_err();

        assert!(matches!(err, Error::DataLengthMismatch { expected: 16, actual: 15 }));
        assert!(err.is_validation());
    }

    #[test]
    fn levels_set_mip_count() {
        let (device, mut worker, probe) = setup();
        let mut tex = Texture::new(&device);
        let levels = vec![MipLevel::new(2, 2, vec![0; 4]), MipLevel::new(1, 1, vec![0; 1])];
        tex.init_from_levels(levels, Size2::new(2.0, 2.0), TextureFlags::empty(), PixelFormat::R8Unorm)
            .unwrap();
        worker.drain();

        assert_eq!(tex.mip_levels(), 2);
        assert!(matches!(probe.ops()[1], BackendOp::UploadTexture { levels: 2, .. }));
    }

    #[test]
    fn inconsistent_mip_chain_is_rejected_without_changes() {
        let (device, mut worker, _probe) = setup();
        let mut tex = Texture::new(&device);
        let before = device.pending();
        let levels = vec![MipLevel::new(2, 2, vec![0; 16]), MipLevel::new(2, 2, vec![0; 16])];

        let err = tex
            .init_from_levels(levels, Size2::new(2.0, 2.0), TextureFlags::empty(), PixelFormat::Rgba8Unorm)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidMipChain { level: 1, expected_width: 1, expected_height: 1, .. }));
        assert!(err.is_validation());
        assert_eq!(tex.mip_levels(), 1);
        assert_eq!(device.pending(), before);
        worker.drain();
        assert_eq!(device.stats().failed, 0);
    }

    #[test]
    fn base_level_must_match_size() {
        let (device, _worker, _probe) = setup();
        let mut tex = Texture::new(&device);
        let levels = vec![MipLevel::new(2, 2, vec![0; 4]), MipLevel::new(1, 1, vec![0; 1])];

        let result = tex.init_from_levels(levels, Size2::new(4.0, 4.0), TextureFlags::empty(), PixelFormat::R8Unorm);
        assert!(matches!(result, Err(Error::InvalidSize { .. })));
        assert_eq!(tex.size(), Size2::zero());
    }

    // ── file init ─────────────────────────────────────────────────────────

    #[test]
    fn decode_failure_creates_nothing() {
        let (device, _worker, _probe) = setup();
        let mut tex = Texture::new(&device);
        let before = device.pending();

        let result = tex.init_from_file_with(
            &FixedDecoder(None),
            "missing.png",
            TextureFlags::empty(),
            1,
            PixelFormat::Rgba8Unorm,
        );

        assert!(result.is_err());
        assert_eq!(tex.filename(), None);
        assert_eq!(tex.size(), Size2::zero());
        assert_eq!(device.pending(), before);
    }

    #[test]
    fn decoded_size_and_format_win() {
        let (device, mut worker, probe) = setup();
        let mut tex = Texture::new(&device);
        let decoder = FixedDecoder(Some(ImageData {
            width: 3,
            height: 2,
            format: PixelFormat::Rgba8UnormSrgb,
            pixels: vec![7; 24],
        }));

        tex.init_from_file_with(&decoder, "sprite.png", TextureFlags::empty(), 1, PixelFormat::R8Unorm)
            .unwrap();
        worker.drain();

        assert_eq!(tex.size(), Size2::new(3.0, 2.0));
        assert_eq!(tex.format(), PixelFormat::Rgba8UnormSrgb);
        assert_eq!(tex.sample_count(), 1);
        assert_eq!(tex.filename(), Some(Path::new("sprite.png")));
        assert!(matches!(
            probe.ops()[1],
            BackendOp::UploadTexture { width: 3, height: 2, format: PixelFormat::Rgba8UnormSrgb, .. }
        ));
    }

    // ── drop ──────────────────────────────────────────────────────────────

    #[test]
    fn drop_before_drain_releases_after_updates() {
        let (device, mut worker, probe) = setup();
        let mut tex = Texture::new(&device);
        let id = tex.id();
        tex.set_data(vec![1; 4], Size2::new(1.0, 1.0)).unwrap();
        drop(tex);
        worker.drain();

        let ops = probe.ops();
        assert!(matches!(ops[1], BackendOp::UploadTexture { .. }));
        assert_eq!(ops[2], BackendOp::DestroyTexture(id));
        assert_eq!(device.stats().failed, 0);
    }

    #[test]
    fn drop_after_shutdown_sends_nothing() {
        let (device, _worker, _probe) = setup();
        let tex = Texture::new(&device);
        let submitted = device.stats().submitted;
        device.mark_shut_down();
        drop(tex);

        assert_eq!(device.stats().submitted, submitted);
    }
}

use anyhow::{Context, Result};
use glam::{Quat, Vec2, Vec3};

use kestrel_engine::coords::{Rect, Size2};
use kestrel_engine::core::{Engine, EngineConfig};
use kestrel_engine::events::Event;
use kestrel_engine::graphics::{
    Buffer, BufferFlags, BufferUsage, DEFAULT_VERTEX_ATTRIBUTES, MeshBuffer, PixelFormat, RendererConfig,
    RendererMode, SamplerAddressMode, Texture, TextureFlags, Vertex,
};
use kestrel_engine::logging::{LoggingConfig, init_logging};
use kestrel_engine::paint::Color;
use kestrel_engine::scene::{
    ActorKey, Camera, Component, ComponentKind, Particle, ParticleSystem, Scene, Sprite, ZIndex,
};
use kestrel_engine::window::{App, AppControl, Runtime, RuntimeConfig, WindowBackendKind, WindowConfig};

const CHECKER_SIZE: u32 = 64;
const HEADLESS_FRAMES: u64 = 120;

/// GPU resources shared by every sprite in the demo.
struct Assets {
    quad: MeshBuffer,
    checker: Texture,
    // Keep the buffers alive for as long as the mesh references them.
    _index: Buffer,
    _vertex: Buffer,
}

impl Assets {
    fn load(engine: &Engine) -> Result<Self> {
        let device = engine.device();

        let vertices = [
            Vertex::new([0.0, 0.0, 0.0], [255; 4], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [255; 4], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 0.0], [255; 4], [1.0, 1.0]),
            Vertex::new([0.0, 1.0, 0.0], [255; 4], [0.0, 1.0]),
        ];
        let mut vertex = Buffer::new(device);
        vertex.init_from_slice(BufferUsage::Vertex, BufferFlags::empty(), &vertices)?;

        let mut index = Buffer::new(device);
        index.init_from_slice(BufferUsage::Index, BufferFlags::empty(), &[0u16, 1, 2, 0, 2, 3])?;

        let mut quad = MeshBuffer::new(device);
        quad.init(2, &index, DEFAULT_VERTEX_ATTRIBUTES.to_vec(), &vertex)?;

        let mut checker = Texture::new(device);
        checker
            .init_from_data(
                checker_pixels(CHECKER_SIZE),
                Size2::from_extent(CHECKER_SIZE, CHECKER_SIZE),
                TextureFlags::GENERATE_MIPMAPS,
                4,
                PixelFormat::Rgba8Unorm,
            )
            .context("checker texture")?;
        checker.set_address_x(SamplerAddressMode::Repeat);
        checker.set_address_y(SamplerAddressMode::Repeat);

        Ok(Self { quad, checker, _index: index, _vertex: vertex })
    }
}

fn checker_pixels(size: u32) -> Vec<u8> {
    let light = Color::from_hex(0xe8e2d0ff).to_u8();
    let dark = Color::from_hex(0x3a4a5cff).to_u8();
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if ((x / 8) + (y / 8)) % 2 == 0 { light } else { dark }
        })
        .collect()
}

#[derive(Default)]
struct Studio {
    assets: Option<Assets>,
    spinner: Option<ActorKey>,
    picked: Option<ActorKey>,
}

impl App for Studio {
    fn init(&mut self, engine: &mut Engine, scene: &mut Scene) -> Result<()> {
        let assets = Assets::load(engine)?;
        engine.renderer_mut().set_clear_color(Color::from_hex(0x101418ff));

        engine.events().add_handler(|event| match event {
            Event::WindowSizeChange(s) => log::info!("window resized to {}x{}", s.size.width, s.size.height),
            Event::ResolutionChange { resolution } => {
                log::info!("back buffer now {}x{}", resolution.width, resolution.height)
            }
            other => log::debug!("{other:?}"),
        });

        let world = scene.add_layer("world", ZIndex(0));
        let overlay = scene.add_layer("overlay", ZIndex(1));

        let camera = scene.add_actor("camera");
        scene.set_actor_layer(camera, Some(world))?;
        let lens = scene.add_component(Component::new(ComponentKind::Camera(Camera::default())));
        scene.attach_component(camera, lens)?;

        for (i, color) in [0xd95d39ffu32, 0xf0a202ff, 0x0e7c7bff].into_iter().enumerate() {
            let tile = scene.add_actor(format!("tile-{i}"));
            scene.set_actor_layer(tile, Some(world))?;
            scene
                .actor_mut(tile)
                .context("tile actor")?
                .set_position(Vec3::new(80.0 + 140.0 * i as f32, 120.0, 0.0));

            let mut sprite = Sprite::new(assets.quad.id(), Vec2::splat(120.0));
            sprite.texture = Some(assets.checker.id());
            sprite.color = Color::from_hex(color);
            let c = scene.add_component(Component::new(ComponentKind::Sprite(sprite)));
            scene.attach_component(tile, c)?;
        }

        let spinner = scene.add_actor("spinner");
        scene.set_actor_layer(spinner, Some(overlay))?;
        scene
            .actor_mut(spinner)
            .context("spinner actor")?
            .set_position(Vec3::new(300.0, 360.0, 0.0));
        let mut sparks = ParticleSystem::new(assets.quad.id());
        sparks.particles = (0..12)
            .map(|i| {
                let angle = i as f32 / 12.0 * std::f32::consts::TAU;
                Particle {
                    position: Vec3::new(angle.cos() * 60.0, angle.sin() * 60.0, 0.0),
                    size: 8.0,
                    color: Color::WHITE.with_opacity(0.4 + 0.05 * i as f32),
                }
            })
            .collect();
        let c = scene.add_component(Component::new(ComponentKind::ParticleSystem(sparks)));
        scene.attach_component(spinner, c)?;

        self.spinner = Some(spinner);
        self.assets = Some(assets);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, scene: &mut Scene) -> AppControl {
        let t = engine.frame_count() as f32 / 60.0;
        if let Some(actor) = self.spinner.and_then(|k| scene.actor_mut(k)) {
            actor.set_rotation(Quat::from_rotation_z(t));
        }

        let Some(world) = scene.layers_in_draw_order().first().copied() else {
            return AppControl::Continue;
        };
        let size = engine.window().size();
        let picked = scene.pick_actor(world, Vec2::new(size.width / 2.0, size.height / 3.0));
        if picked != self.picked {
            let name = picked.and_then(|k| scene.actor(k)).map(|a| a.name().to_string());
            log::info!("actor under probe: {}", name.as_deref().unwrap_or("none"));
            self.picked = picked;
        }

        AppControl::Continue
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        window: WindowConfig {
            title: "Kestrel Studio".to_string(),
            size: Size2::new(820.0, 560.0),
            ..WindowConfig::default()
        },
        renderer: RendererConfig::default(),
        platform: None,
    }
}

/// Drives the same app against the headless back-ends for a fixed number of
/// frames. Used when no display is available.
fn run_headless(mut app: Studio) -> Result<()> {
    let config = EngineConfig {
        renderer: RendererConfig { mode: RendererMode::Manual, ..RendererConfig::default() },
        platform: Some(WindowBackendKind::Headless),
        ..config()
    };
    let (mut engine, probes) = Engine::headless(config)?;
    let mut scene = Scene::new();
    app.init(&mut engine, &mut scene)?;

    engine.renderer_mut().set_clear_color(Color::BLACK);
    engine.window_mut().set_size(Size2::new(640.0, 480.0));

    while engine.frame_count() < HEADLESS_FRAMES && engine.update() {
        if app.update(&mut engine, &mut scene) == AppControl::Exit {
            break;
        }
        engine.render_frame(&mut scene);
    }

    let stats = engine.renderer().stats();
    log::info!(
        "headless run: {} frames, {} draw calls, {} device ops, {} failed",
        stats.frames,
        stats.draw_calls,
        probes.device.len(),
        stats.failed
    );
    let viewport = Rect::new(0.0, 0.0, engine.resolution().width, engine.resolution().height);
    log::info!("final viewport {viewport:?}");
    engine.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let app = Studio::default();
    match WindowBackendKind::detect() {
        WindowBackendKind::Headless => run_headless(app),
        WindowBackendKind::Winit => Runtime::run(RuntimeConfig { engine: config(), ..RuntimeConfig::default() }, app),
    }
}

//! # Frame Orchestrator
//!
//! [`Engine`] owns the world, the pipelines, the picker and the device, and
//! runs one frame per [`tick`](Engine::tick):
//!
//! 1. behaviours start and update
//! 2. render instances are collected once, in spawn order
//! 3. frame and instance uniforms are uploaded
//! 4. the color pass draws meshes, then icons when enabled
//! 5. the pick pass is recorded if a pick should run
//! 6. everything is submitted together
//! 7. an in-flight pick readback is polled
//!
//! A resolved pick is mapped back to an entity and delivered to the host's
//! [`SelectionSink`] before the picker returns to idle.

use std::path::Path;

use thiserror::Error;

use crate::assets::{AssetError, ImageData, ImageTextureLoader, ShaderLoader, SpirvShaderLoader, TextureLoader};
use crate::config::{Config, ConfigError, ShaderConfig, ViewerConfig};
use crate::ecs::systems::{collect_frame_instances, BehaviourScheduler, FrameInstances, ScheduleStats};
use crate::ecs::{EntityId, SceneError, World};
use crate::foundation::math::{Mat4, Vec3};
use crate::foundation::time::FrameTimer;
use crate::render::api::{CommandEncoder, GraphicsDevice, TextureHandle};
use crate::render::picking::{GpuPicker, PickOutcome, PickPhase};
use crate::render::pipeline::{IconPipeline, ShaderPair, StandardPipeline};
use crate::render::{Camera, RenderError, RenderTarget};

/// Texture key of the built-in entity icon
const DEFAULT_ICON: &str = "entity";

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Rendering failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Scene graph operation failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Configuration was invalid or unreadable
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// An asset could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
}

/// Receives resolved picks
pub trait SelectionSink {
    /// A pick resolved; `None` means nothing was under the cursor
    fn on_selection(&mut self, entity: Option<EntityId>);

    /// The pick readback failed; the picker is idle again
    fn on_pick_failed(&mut self, reason: &str) {
        log::warn!("Pick failed: {}", reason);
    }
}

impl<F: FnMut(Option<EntityId>)> SelectionSink for F {
    fn on_selection(&mut self, entity: Option<EntityId>) {
        self(entity);
    }
}

/// Default sink that only logs
#[derive(Debug, Default)]
pub struct LogSelectionSink;

impl SelectionSink for LogSelectionSink {
    fn on_selection(&mut self, entity: Option<EntityId>) {
        match entity {
            Some(id) => log::info!("Selected entity {}", id),
            None => log::info!("Selection cleared"),
        }
    }
}

/// Shader modules and the icon texture the pipelines are built from
#[derive(Debug, Clone, Copy)]
pub struct EngineAssets {
    /// Lit mesh shaders
    pub standard: ShaderPair,
    /// Object id shaders
    pub picker: ShaderPair,
    /// Billboard shaders
    pub icon: ShaderPair,
    /// Texture drawn on every icon
    pub icon_texture: TextureHandle,
}

impl EngineAssets {
    /// Load every shader named in `config`, plus the icon texture
    ///
    /// A missing icon image is replaced with a solid placeholder so the
    /// overlay can still be toggled on.
    pub fn load(device: &mut dyn GraphicsDevice, config: &ViewerConfig) -> Result<Self, AssetError> {
        let standard = Self::load_pair(device, &config.shaders.standard)?;
        let picker = Self::load_pair(device, &config.shaders.picker)?;
        let icon = Self::load_pair(device, &config.shaders.icon)?;

        let icon_texture = match ImageTextureLoader.load_texture(device, Path::new(&config.icons.texture_path)) {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("Using placeholder icon, '{}' failed to load: {}", config.icons.texture_path, e);
                ImageData::solid_color(16, 16, [255, 200, 64, 255]).upload(device, "placeholder icon")?
            }
        };

        Ok(Self { standard, picker, icon, icon_texture })
    }

    /// Empty shader modules and a solid icon
    ///
    /// Only for devices that do not compile shader code, such as
    /// [`HeadlessDevice`](crate::render::HeadlessDevice).
    pub fn placeholder(device: &mut dyn GraphicsDevice) -> Result<Self, AssetError> {
        let mut pair = |name: &str| -> Result<ShaderPair, AssetError> {
            Ok(ShaderPair {
                vertex: device.create_shader_module(&format!("{} placeholder.vert", name), &[])?,
                fragment: device.create_shader_module(&format!("{} placeholder.frag", name), &[])?,
            })
        };
        let standard = pair("standard")?;
        let picker = pair("picker")?;
        let icon = pair("icon")?;
        let icon_texture = ImageData::solid_color(2, 2, [255, 255, 255, 255]).upload(device, "placeholder icon")?;
        Ok(Self { standard, picker, icon, icon_texture })
    }

    fn load_pair(device: &mut dyn GraphicsDevice, shader: &ShaderConfig) -> Result<ShaderPair, AssetError> {
        Ok(ShaderPair {
            vertex: SpirvShaderLoader.load_shader(device, Path::new(&shader.vertex_shader_path))?,
            fragment: SpirvShaderLoader.load_shader(device, Path::new(&shader.fragment_shader_path))?,
        })
    }
}

/// How a pick resolved this frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickResolution {
    /// Picked entity, or `None` for background and stale ids
    Selected(Option<EntityId>),
    /// Readback failed
    Failed(String),
}

/// Summary of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Seconds since the previous frame
    pub delta_time: f32,
    /// Behaviour scheduler counts
    pub behaviours: ScheduleStats,
    /// Mesh draws in the color pass
    pub mesh_draws: u32,
    /// Icon draws in the color pass
    pub icon_draws: u32,
    /// Whether a pick pass was recorded
    pub pick_encoded: bool,
    /// Pick resolved this frame, if any
    pub pick: Option<PickResolution>,
}

/// Per-frame data threaded through the render steps
#[derive(Debug)]
pub struct FrameContext {
    /// Frame number
    pub frame: u64,
    /// Seconds since the previous frame
    pub delta_time: f32,
    /// Camera view matrix
    pub view: Mat4,
    /// Camera projection including the Vulkan clip correction
    pub projection: Mat4,
    /// Camera position in world space
    pub camera_position: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// This frame's instances
    pub instances: FrameInstances,
}

impl FrameContext {
    fn new(frame: u64, delta_time: f32, camera: &Camera, instances: FrameInstances) -> Self {
        Self {
            frame,
            delta_time,
            view: camera.get_view_matrix(),
            projection: camera.get_projection_matrix(),
            camera_position: camera.position,
            fov: camera.fov,
            instances,
        }
    }
}

/// Scene viewer core
pub struct Engine<D: GraphicsDevice> {
    device: D,
    config: ViewerConfig,
    world: World,
    scheduler: BehaviourScheduler,
    timer: FrameTimer,
    camera: Camera,
    standard: StandardPipeline,
    icons: IconPipeline,
    picker: GpuPicker,
    color_target: RenderTarget,
    icons_visible: bool,
    sink: Box<dyn SelectionSink>,
}

impl<D: GraphicsDevice> Engine<D> {
    /// Build the pipelines and targets for `config` on `device`
    pub fn new(mut device: D, config: ViewerConfig, assets: EngineAssets) -> Result<Self, EngineError> {
        config.validate()?;
        let (width, height) = config.resolution.dimensions();
        log::info!("Initializing engine on '{}' at {}x{}", device.name(), width, height);

        let standard = StandardPipeline::new(&mut device, assets.standard, config.max_instances)?;
        let mut icons = IconPipeline::new(&mut device, assets.icon, config.max_icons, config.icons.size)?;
        icons.add_icon(&mut device, DEFAULT_ICON, assets.icon_texture)?;
        let picker = GpuPicker::new(&mut device, assets.picker, config.max_instances, width, height)?;
        let color_target = RenderTarget::new(&mut device, "viewer", width, height)?;
        let camera = Camera::from_config(&config.camera, config.resolution.aspect_ratio());

        Ok(Self {
            device,
            icons_visible: config.icons.enabled,
            config,
            world: World::new(),
            scheduler: BehaviourScheduler::new(),
            timer: FrameTimer::new(),
            camera,
            standard,
            icons,
            picker,
            color_target,
            sink: Box::new(LogSelectionSink),
        })
    }

    /// Route resolved picks to `sink`
    pub fn set_selection_sink(&mut self, sink: impl SelectionSink + 'static) {
        self.sink = Box::new(sink);
    }

    /// Run one frame with the wall-clock delta
    pub fn tick(&mut self) -> Result<FrameReport, EngineError> {
        let delta_time = self.timer.update();
        self.run_frame(delta_time)
    }

    /// Run one frame with an explicit delta
    pub fn tick_with_delta(&mut self, delta_time: f32) -> Result<FrameReport, EngineError> {
        let delta_time = self.timer.advance(delta_time);
        self.run_frame(delta_time)
    }

    fn run_frame(&mut self, delta_time: f32) -> Result<FrameReport, EngineError> {
        self.device.begin_frame()?;

        let behaviours = self.scheduler.run(&mut self.world, delta_time);
        let frame = FrameContext::new(
            self.timer.frame_count(),
            delta_time,
            &self.camera,
            collect_frame_instances(&self.world),
        );

        let mut encoder = CommandEncoder::new();
        let (mesh_draws, icon_draws) = self.encode_color_pass(&mut encoder, &frame)?;
        let pick_encoded = self.picker.encode_pick(
            &mut self.device,
            &mut encoder,
            &frame.instances.meshes,
            &frame.view,
            &frame.projection,
        )?;

        self.device.submit(encoder.finish())?;
        if pick_encoded {
            self.picker.on_submitted(&mut self.device);
        }
        let pick = self.resolve_pick();

        log::trace!(
            "Frame {}: {} meshes, {} icons, pick {:?}",
            frame.frame,
            mesh_draws,
            icon_draws,
            self.picker.phase()
        );
        Ok(FrameReport {
            frame: frame.frame,
            delta_time,
            behaviours,
            mesh_draws,
            icon_draws,
            pick_encoded,
            pick,
        })
    }

    fn encode_color_pass(&mut self, encoder: &mut CommandEncoder, frame: &FrameContext) -> Result<(u32, u32), RenderError> {
        let meshes = &frame.instances.meshes;
        let icons = &frame.instances.icons;
        let draw_icons = self.icons_visible && !icons.is_empty();

        self.standard.update_frame_uniforms(&mut self.device, &frame.view, &frame.projection)?;
        self.standard.upload_instances(&mut self.device, meshes)?;
        if draw_icons {
            self.icons
                .update_frame_uniforms(&mut self.device, &frame.view, &frame.projection, &frame.camera_position, frame.fov)?;
            self.icons.upload_instances(&mut self.device, icons)?;
        }

        let mut pass = encoder.begin_render_pass(
            "color",
            self.color_target.color,
            Some(self.color_target.depth),
            self.config.clear_color,
        );
        let mesh_draws = self.standard.draw(&mut pass, meshes)?;
        let icon_draws = if draw_icons { self.icons.draw(&mut pass, icons, DEFAULT_ICON)? } else { 0 };
        pass.end();
        Ok((mesh_draws, icon_draws))
    }

    fn resolve_pick(&mut self) -> Option<PickResolution> {
        let outcome = self.picker.poll(&mut self.device)?;
        let resolution = match outcome {
            PickOutcome::Picked(object_id) => {
                let entity = self.world.find_by_object_id(object_id);
                if entity.is_none() {
                    log::debug!("Picked id {} no longer names an entity", object_id);
                }
                self.sink.on_selection(entity);
                PickResolution::Selected(entity)
            }
            PickOutcome::Nothing => {
                self.sink.on_selection(None);
                PickResolution::Selected(None)
            }
            PickOutcome::Failed(reason) => {
                log::warn!("Pick readback failed: {}", reason);
                self.sink.on_pick_failed(&reason);
                PickResolution::Failed(reason)
            }
        };
        self.picker.complete(&mut self.device);
        Some(resolution)
    }

    /// Recreate the viewport-sized targets
    ///
    /// A zero-sized viewport (minimized window) is ignored. An in-flight pick
    /// is abandoned; a pending request survives.
    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return Ok(());
        }
        let color_target = RenderTarget::new(&mut self.device, "viewer", width, height)?;
        if let Err(e) = self.picker.resize(&mut self.device, width, height) {
            color_target.destroy(&mut self.device);
            return Err(e.into());
        }
        let old = std::mem::replace(&mut self.color_target, color_target);
        old.destroy(&mut self.device);
        self.camera.set_aspect_ratio(width as f32 / height as f32);
        log::info!("Viewport resized to {}x{}", width, height);
        Ok(())
    }

    /// Queue a pick at window coordinates
    pub fn request_pick(&mut self, x: i32, y: i32) {
        self.picker.request_pick(x, y);
    }

    /// Current pick phase
    pub fn pick_phase(&self) -> PickPhase {
        self.picker.phase()
    }

    /// Picking service
    pub fn picker(&self) -> &GpuPicker {
        &self.picker
    }

    /// Show or hide the icon overlay
    pub fn set_icons_visible(&mut self, visible: bool) {
        log::debug!("Icons {}", if visible { "shown" } else { "hidden" });
        self.icons_visible = visible;
    }

    /// Whether icons are drawn
    pub fn icons_visible(&self) -> bool {
        self.icons_visible
    }

    /// Scene graph
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Scene graph, mutably
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Main camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Main camera, mutably
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Graphics device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Graphics device, mutably; used to load meshes for the scene
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Color and depth attachments of the viewport
    pub fn color_target(&self) -> &RenderTarget {
        &self.color_target
    }

    /// Active configuration
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Frame timing
    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }
}

impl<D: GraphicsDevice> Drop for Engine<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device did not go idle on shutdown: {}", e);
        }
        self.picker.destroy(&mut self.device);
        self.icons.destroy(&mut self.device);
        self.standard.destroy(&mut self.device);
        self.color_target.destroy(&mut self.device);
        log::info!("Engine shut down");
    }
}

//! Scene viewer demo
//!
//! Builds a grid of spinning cubes, renders a fixed number of frames and
//! picks whatever sits at the centre of the viewport.
//!
//! Usage: `scene_viewer [config.toml|config.ron]`

use std::sync::Arc;

use rand::Rng;
use scene_engine::backend::VulkanDevice;
use scene_engine::prelude::*;
use thiserror::Error;

const FRAME_COUNT: u32 = 120;
const PICK_FRAME: u32 = 60;
const GRID_COLUMNS: usize = 5;
const GRID_ROWS: usize = 2;
const GRID_SPACING: f32 = 3.0;

#[derive(Error, Debug)]
enum ViewerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Scene setup failed: {0}")]
    Scene(#[from] SceneError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

fn load_config() -> ViewerConfig {
    let Some(path) = std::env::args().nth(1) else {
        log::info!("No config file given, using defaults");
        return ViewerConfig::default();
    };
    match ViewerConfig::load_from_file(&path) {
        Ok(config) => {
            log::info!("Loaded config from {}", path);
            config
        }
        Err(e) => {
            log::warn!("Failed to load config '{}', using defaults: {}", path, e);
            ViewerConfig::default()
        }
    }
}

/// Root entity plus a grid of cubes, each spinning about its own random axis
fn build_demo_scene<D: GraphicsDevice>(engine: &mut Engine<D>) -> Result<(), ViewerError> {
    let cube = Arc::new(MeshData::cube().upload(engine.device_mut(), "cube")?);
    let world = engine.world_mut();
    let root = world.spawn_with_transform("root")?;
    let mut rng = rand::thread_rng();

    for index in 0..GRID_COLUMNS * GRID_ROWS {
        let child = world.spawn_with_transform(format!("cube {}", index))?;
        let position = Vec3::new(
            (index % GRID_COLUMNS) as f32 * GRID_SPACING - 5.0,
            (index / GRID_COLUMNS) as f32 * GRID_SPACING - 5.0,
            0.0,
        );
        if let Some(object) = world.get_mut(child) {
            if let Some(transform) = object.transform_mut() {
                transform.set_position(position);
                transform.set_rotation_from_angle_axis(std::f32::consts::FRAC_PI_4, Vec3::x());
            }
            object.attach_mesh(Arc::clone(&cube));
            let speed = rng.gen_range(0.5..2.0) * RotateBehaviour::default_speed();
            object.attach_behaviour(RotateBehaviour::new().with_speed(speed));
        }
        world.set_parent(child, root)?;
    }

    log::info!("Demo scene has {} entities", world.len());

    // Centre the view on cube 7 so the centre pick has something to hit
    let focus = Vec3::new(1.0, -2.0, 0.0);
    let camera = engine.camera_mut();
    camera.set_position(focus + Vec3::new(0.0, 0.0, 20.0));
    camera.set_target(focus);
    Ok(())
}

fn run<D: GraphicsDevice>(device: D, assets: EngineAssets, config: ViewerConfig) -> Result<(), ViewerError> {
    let (width, height) = config.resolution.dimensions();
    let mut engine = Engine::new(device, config, assets)?;
    build_demo_scene(&mut engine)?;

    engine.set_selection_sink(|entity: Option<EntityId>| match entity {
        Some(id) => log::info!("Picked entity {}", id),
        None => log::info!("Nothing under the cursor"),
    });

    for frame in 0..FRAME_COUNT {
        if frame == PICK_FRAME {
            log::info!("Requesting pick at viewport centre");
            engine.request_pick((width / 2) as i32, (height / 2) as i32);
        }
        let report = engine.tick()?;
        if let Some(pick) = &report.pick {
            log::info!("Frame {} resolved pick: {:?}", report.frame, pick);
        }
    }

    log::info!(
        "Rendered {} frames at {:.1} fps",
        engine.timer().frame_count(),
        engine.timer().average_fps()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting scene viewer");

    let config = load_config();

    let vulkan = VulkanDevice::new("Scene Viewer").map_err(EngineError::from).and_then(|mut device| {
        let assets = EngineAssets::load(&mut device, &config)?;
        Ok((device, assets))
    });

    let result = match vulkan {
        Ok((device, assets)) => run(device, assets, config),
        Err(e) => {
            log::warn!("Vulkan unavailable ({}), falling back to the headless device", e);
            let mut device = HeadlessDevice::new();
            match EngineAssets::placeholder(&mut device) {
                Ok(assets) => run(device, assets, config),
                Err(e) => Err(ViewerError::Engine(e.into())),
            }
        }
    };

    if let Err(e) = result {
        log::error!("Viewer failed: {}", e);
        std::process::exit(1);
    }
    log::info!("Scene viewer exited cleanly");
}

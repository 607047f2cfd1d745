//! Picking service driving the pick pass and the asynchronous readback

use super::encoding::{decode_object_id, NO_OBJECT};
use super::state::{PickPhase, PickState};
use super::target::{PickTarget, PICK_TEXEL_SIZE};
use crate::ecs::systems::RenderInstance;
use crate::foundation::math::Mat4;
use crate::render::api::{CommandEncoder, GraphicsDevice, ReadbackStatus, ReadbackTicket};
use crate::render::pipeline::{PickerPipeline, ShaderPair};
use crate::render::RenderResult;

/// Resolved pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// The texel held this object id
    Picked(u32),
    /// The texel was background
    Nothing,
    /// The readback could not be completed
    Failed(String),
}

impl PickOutcome {
    fn from_texel(bytes: &[u8]) -> Self {
        match <[u8; 4]>::try_from(bytes) {
            Ok(texel) => match decode_object_id(texel) {
                NO_OBJECT => PickOutcome::Nothing,
                id => PickOutcome::Picked(id),
            },
            Err(_) => PickOutcome::Failed(format!("expected {} readback bytes, got {}", PICK_TEXEL_SIZE, bytes.len())),
        }
    }
}

/// Mouse picking over the object id pipeline
#[derive(Debug)]
pub struct GpuPicker {
    pipeline: PickerPipeline,
    target: PickTarget,
    state: PickState,
    ticket: Option<ReadbackTicket>,
    early_failure: Option<String>,
}

impl GpuPicker {
    /// Create the pipeline and a pick target of the viewport size
    pub fn new(
        device: &mut dyn GraphicsDevice,
        shaders: ShaderPair,
        capacity: u32,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let mut pipeline = PickerPipeline::new(device, shaders, capacity)?;
        let target = match PickTarget::new(device, width, height) {
            Ok(target) => target,
            Err(e) => {
                pipeline.destroy(device);
                return Err(e);
            }
        };
        log::info!("Created GPU picker {}x{} for {} objects", width, height, capacity);
        Ok(Self { pipeline, target, state: PickState::new(), ticket: None, early_failure: None })
    }

    /// Queue a pick at window coordinates
    pub fn request_pick(&mut self, x: i32, y: i32) {
        log::debug!("Pick requested at ({}, {})", x, y);
        self.state.request(x, y);
    }

    /// A request is pending and no pick is in flight
    pub fn should_run_picking(&self) -> bool {
        self.state.should_run_picking()
    }

    /// Current phase
    pub fn phase(&self) -> PickPhase {
        self.state.phase()
    }

    /// Request flags and cursor
    pub fn state(&self) -> &PickState {
        &self.state
    }

    /// Pick target
    pub fn target(&self) -> &PickTarget {
        &self.target
    }

    /// Object id pipeline
    pub fn pipeline(&self) -> &PickerPipeline {
        &self.pipeline
    }

    /// Record the pick pass and readback copies if a pick should run
    ///
    /// Returns whether anything was recorded. On error the pick is dropped and
    /// the picker is usable again on the next frame.
    pub fn encode_pick(
        &mut self,
        device: &mut dyn GraphicsDevice,
        encoder: &mut CommandEncoder,
        instances: &[RenderInstance],
        view: &Mat4,
        projection: &Mat4,
    ) -> RenderResult<bool> {
        let Some((x, y)) = self.state.begin() else {
            return Ok(false);
        };
        let pixel = self.target.clamp_cursor(x, y);
        match self.record(device, encoder, instances, view, projection, pixel) {
            Ok(()) => {
                log::debug!("Pick pass at texel {:?} over {} instances", pixel, instances.len());
                Ok(true)
            }
            Err(e) => {
                self.state.finish();
                Err(e)
            }
        }
    }

    fn record(
        &self,
        device: &mut dyn GraphicsDevice,
        encoder: &mut CommandEncoder,
        instances: &[RenderInstance],
        view: &Mat4,
        projection: &Mat4,
        pixel: (u32, u32),
    ) -> RenderResult<()> {
        self.pipeline.update_frame_uniforms(device, view, projection)?;
        self.pipeline.upload_instances(device, instances)?;
        {
            let mut pass = self.target.begin_pass(encoder, pixel);
            self.pipeline.draw(&mut pass, instances)?;
        }
        self.target.encode_readback(encoder, pixel);
        Ok(())
    }

    /// Start mapping the readback buffer once the pick pass is submitted
    pub fn on_submitted(&mut self, device: &mut dyn GraphicsDevice) {
        if self.state.phase() != PickPhase::PickActive {
            return;
        }
        match device.map_read_async(self.target.readback_buffer(), 0, PICK_TEXEL_SIZE) {
            Ok(ticket) => self.ticket = Some(ticket),
            Err(e) => self.early_failure = Some(e.to_string()),
        }
        self.state.mark_submitted();
    }

    /// Check the readback without blocking
    ///
    /// A returned outcome must be followed by [`complete`](Self::complete).
    pub fn poll(&mut self, device: &mut dyn GraphicsDevice) -> Option<PickOutcome> {
        if self.state.phase() != PickPhase::Resolving {
            return None;
        }
        if let Some(reason) = self.early_failure.take() {
            return Some(PickOutcome::Failed(reason));
        }
        let ticket = self.ticket?;
        match device.poll_readback(ticket) {
            ReadbackStatus::Pending => None,
            ReadbackStatus::Ready(bytes) => {
                self.ticket = None;
                Some(PickOutcome::from_texel(&bytes))
            }
            ReadbackStatus::Failed(reason) => {
                self.ticket = None;
                Some(PickOutcome::Failed(reason))
            }
        }
    }

    /// Leave the active pick; deferred requests run on the next frame
    ///
    /// A readback still in flight is cancelled on `device`.
    pub fn complete(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(ticket) = self.ticket.take() {
            device.cancel_readback(ticket);
        }
        self.early_failure = None;
        self.state.finish();
    }

    /// Recreate the pick target at a new viewport size
    ///
    /// An in-flight pick is abandoned; a pending request survives. If the new
    /// target cannot be created the old one and any active pick are kept.
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<()> {
        let target = PickTarget::new(device, width, height)?;
        if self.state.is_active() {
            log::debug!("Abandoning in-flight pick on resize");
            self.complete(device);
        }
        let old = std::mem::replace(&mut self.target, target);
        old.destroy(device);
        Ok(())
    }

    /// Release GPU resources
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.target.destroy(device);
        self.pipeline.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ecs::World;
    use crate::ecs::systems::collect_frame_instances;
    use crate::render::{HeadlessDevice, MeshData};

    fn picker(device: &mut HeadlessDevice) -> GpuPicker {
        let shaders = ShaderPair {
            vertex: device.create_shader_module("picker.vert", &[]).expect("shader"),
            fragment: device.create_shader_module("picker.frag", &[]).expect("shader"),
        };
        GpuPicker::new(device, shaders, 16, 64, 48).expect("picker")
    }

    fn scene(device: &mut HeadlessDevice) -> (World, Vec<RenderInstance>) {
        let mesh = Arc::new(MeshData::cube().upload(device, "cube").expect("mesh"));
        let mut world = World::new();
        let id = world.spawn_with_transform("cube").expect("spawn");
        world.get_mut(id).expect("entity").attach_mesh(mesh);
        let instances = collect_frame_instances(&world).meshes;
        (world, instances)
    }

    fn run_frame(picker: &mut GpuPicker, device: &mut HeadlessDevice, instances: &[RenderInstance]) -> bool {
        let mut encoder = CommandEncoder::new();
        let recorded = picker
            .encode_pick(device, &mut encoder, instances, &Mat4::identity(), &Mat4::identity())
            .expect("encode");
        device.submit(encoder.finish()).expect("submit");
        if recorded {
            picker.on_submitted(device);
        }
        recorded
    }

    #[test]
    fn test_pick_resolves_entity_id() {
        let mut device = HeadlessDevice::new();
        let mut picker = picker(&mut device);
        let (world, instances) = scene(&mut device);
        let expected = world.ids()[0].get();

        picker.request_pick(10, 10);
        assert!(run_frame(&mut picker, &mut device, &instances));
        assert_eq!(picker.phase(), PickPhase::Resolving);
        assert_eq!(picker.poll(&mut device), Some(PickOutcome::Picked(expected)));
        picker.complete(&mut device);
        assert_eq!(picker.phase(), PickPhase::Idle);
    }

    #[test]
    fn test_empty_scene_picks_nothing() {
        let mut device = HeadlessDevice::new();
        let mut picker = picker(&mut device);
        picker.request_pick(-20, 500);
        assert!(run_frame(&mut picker, &mut device, &[]));
        assert_eq!(picker.poll(&mut device), Some(PickOutcome::Nothing));
    }

    #[test]
    fn test_latency_keeps_pick_resolving() {
        let mut device = HeadlessDevice::new();
        device.set_readback_latency(2);
        let mut picker = picker(&mut device);

        picker.request_pick(1, 1);
        run_frame(&mut picker, &mut device, &[]);
        picker.request_pick(2, 2);
        assert_eq!(picker.poll(&mut device), None);
        assert!(!run_frame(&mut picker, &mut device, &[]));
        assert_eq!(picker.poll(&mut device), None);
        assert_eq!(picker.poll(&mut device), Some(PickOutcome::Nothing));
        picker.complete(&mut device);

        assert_eq!(picker.phase(), PickPhase::RequestPending);
        assert!(run_frame(&mut picker, &mut device, &[]));
    }

    #[test]
    fn test_readback_failure_is_reported() {
        let mut device = HeadlessDevice::new();
        let mut picker = picker(&mut device);
        device.fail_next_readback();
        picker.request_pick(0, 0);
        run_frame(&mut picker, &mut device, &[]);
        assert!(matches!(picker.poll(&mut device), Some(PickOutcome::Failed(_))));
        picker.complete(&mut device);
        assert_eq!(picker.phase(), PickPhase::Idle);
    }

    #[test]
    fn test_resize_abandons_active_pick_but_keeps_request() {
        let mut device = HeadlessDevice::new();
        let mut picker = picker(&mut device);
        picker.request_pick(5, 5);
        run_frame(&mut picker, &mut device, &[]);
        picker.request_pick(6, 6);

        picker.resize(&mut device, 128, 96).expect("resize");
        assert_eq!(picker.phase(), PickPhase::RequestPending);
        assert_eq!(picker.target().width(), 128);
        assert_eq!(picker.poll(&mut device), None);
    }

    #[test]
    fn test_abandoned_picks_release_their_readbacks() {
        let mut device = HeadlessDevice::new();
        device.set_readback_latency(5);
        let mut picker = picker(&mut device);

        for round in 0..10 {
            picker.request_pick(round, round);
            assert!(run_frame(&mut picker, &mut device, &[]));
            assert_eq!(device.pending_readbacks(), 1);
            picker.resize(&mut device, 64 + round as u32, 48).expect("resize");
        }
        assert_eq!(device.pending_readbacks(), 0);
        assert_eq!(picker.phase(), PickPhase::Idle);
    }

    #[test]
    fn test_completing_unresolved_pick_cancels_readback() {
        let mut device = HeadlessDevice::new();
        device.set_readback_latency(3);
        let mut picker = picker(&mut device);
        picker.request_pick(1, 1);
        run_frame(&mut picker, &mut device, &[]);
        assert_eq!(picker.poll(&mut device), None);

        picker.complete(&mut device);
        assert_eq!(device.pending_readbacks(), 0);
        assert_eq!(picker.phase(), PickPhase::Idle);
    }

    #[test]
    fn test_failed_resize_keeps_target_and_pick() {
        let mut device = HeadlessDevice::new();
        device.set_readback_latency(1);
        let mut picker = picker(&mut device);
        let (world, instances) = scene(&mut device);
        picker.request_pick(32, 24);
        run_frame(&mut picker, &mut device, &instances);

        assert!(picker.resize(&mut device, 40000, 40000).is_err());
        assert_eq!(picker.target().width(), 64);
        assert_eq!(picker.target().height(), 48);
        assert_eq!(picker.phase(), PickPhase::Resolving);
        assert_eq!(picker.poll(&mut device), None);
        assert_eq!(picker.poll(&mut device), Some(PickOutcome::Picked(world.ids()[0].get())));
    }
}

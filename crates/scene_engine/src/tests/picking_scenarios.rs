use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::config::{Resolution, ViewerConfig};
use crate::ecs::EntityId;
use crate::render::picking::PickPhase;
use crate::render::api::Command;
use crate::render::{HeadlessDevice, MeshData};
use crate::{Engine, EngineAssets, PickResolution, SelectionSink};

fn engine_with(mut device: HeadlessDevice) -> Engine<HeadlessDevice> {
    let assets = EngineAssets::placeholder(&mut device).expect("assets");
    let config = ViewerConfig {
        resolution: Resolution::Custom { width: 320, height: 240 },
        ..ViewerConfig::default()
    };
    Engine::new(device, config, assets).expect("engine")
}

fn spawn_cube(engine: &mut Engine<HeadlessDevice>, name: &str) -> EntityId {
    let mesh = Arc::new(MeshData::cube().upload(engine.device_mut(), name).expect("mesh"));
    let id = engine.world_mut().spawn_with_transform(name).expect("spawn");
    engine.world_mut().get_mut(id).expect("entity").attach_mesh(mesh);
    id
}

#[derive(Default)]
struct Recorded {
    selections: Vec<Option<EntityId>>,
    failures: Vec<String>,
}

struct RecordingSink(Rc<RefCell<Recorded>>);

impl SelectionSink for RecordingSink {
    fn on_selection(&mut self, entity: Option<EntityId>) {
        self.0.borrow_mut().selections.push(entity);
    }

    fn on_pick_failed(&mut self, reason: &str) {
        self.0.borrow_mut().failures.push(reason.to_string());
    }
}

fn recording(engine: &mut Engine<HeadlessDevice>) -> Rc<RefCell<Recorded>> {
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    engine.set_selection_sink(RecordingSink(Rc::clone(&recorded)));
    recorded
}

#[test]
fn test_pick_resolves_entity_42_end_to_end() {
    let mut engine = engine_with(HeadlessDevice::new());
    for index in 0..41 {
        engine.world_mut().spawn(format!("filler {}", index)).expect("spawn");
    }
    let target = spawn_cube(&mut engine, "target");
    assert_eq!(target.get(), 42);
    let recorded = recording(&mut engine);

    engine.request_pick(160, 120);
    let report = engine.tick_with_delta(0.016).expect("tick");

    assert!(report.pick_encoded);
    assert_eq!(report.mesh_draws, 1);
    assert_eq!(report.pick, Some(PickResolution::Selected(Some(target))));
    assert_eq!(recorded.borrow().selections, vec![Some(target)]);
    assert_eq!(engine.pick_phase(), PickPhase::Idle);
}

#[test]
fn test_background_pick_clears_selection() {
    let mut engine = engine_with(HeadlessDevice::new());
    let recorded = recording(&mut engine);

    engine.request_pick(10, 10);
    let report = engine.tick_with_delta(0.016).expect("tick");

    assert_eq!(report.pick, Some(PickResolution::Selected(None)));
    assert_eq!(recorded.borrow().selections, vec![None]);
}

#[test]
fn test_request_during_active_pick_runs_after_completion() {
    let mut device = HeadlessDevice::new();
    device.set_readback_latency(2);
    let mut engine = engine_with(device);
    spawn_cube(&mut engine, "cube");
    let recorded = recording(&mut engine);

    engine.request_pick(1, 1);
    let first = engine.tick_with_delta(0.016).expect("tick");
    assert!(first.pick_encoded);
    assert_eq!(first.pick, None);
    assert_eq!(engine.pick_phase(), PickPhase::Resolving);

    engine.request_pick(2, 2);
    let second = engine.tick_with_delta(0.016).expect("tick");
    assert!(!second.pick_encoded);
    assert_eq!(second.pick, None);

    let third = engine.tick_with_delta(0.016).expect("tick");
    assert!(!third.pick_encoded);
    assert!(third.pick.is_some());
    assert_eq!(engine.pick_phase(), PickPhase::RequestPending);

    let fourth = engine.tick_with_delta(0.016).expect("tick");
    assert!(fourth.pick_encoded);
    assert_eq!(engine.picker().state().cursor(), (2, 2));
    let last = engine.device().submissions().last().expect("submission");
    assert!(last
        .commands()
        .iter()
        .any(|c| matches!(c, Command::SetScissor { x: 2, y: 2, width: 1, height: 1 })));
    assert_eq!(recorded.borrow().selections.len(), 1);
}

#[test]
fn test_failed_readback_returns_to_idle() {
    let mut device = HeadlessDevice::new();
    device.fail_next_readback();
    let mut engine = engine_with(device);
    spawn_cube(&mut engine, "cube");
    let recorded = recording(&mut engine);

    engine.request_pick(5, 5);
    let report = engine.tick_with_delta(0.016).expect("tick");

    assert!(matches!(report.pick, Some(PickResolution::Failed(_))));
    assert_eq!(engine.pick_phase(), PickPhase::Idle);
    assert_eq!(recorded.borrow().failures.len(), 1);
    assert!(recorded.borrow().selections.is_empty());

    engine.request_pick(5, 5);
    let retry = engine.tick_with_delta(0.016).expect("tick");
    assert!(matches!(retry.pick, Some(PickResolution::Selected(Some(_)))));
}

#[test]
fn test_closure_sink_receives_selection() {
    let mut engine = engine_with(HeadlessDevice::new());
    let cube = spawn_cube(&mut engine, "cube");
    let picked = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&picked);
    engine.set_selection_sink(move |entity: Option<EntityId>| sink.borrow_mut().push(entity));

    engine.request_pick(0, 0);
    engine.tick_with_delta(0.016).expect("tick");
    assert_eq!(*picked.borrow(), vec![Some(cube)]);
}

#[test]
fn test_resize_keeps_pending_request_and_ignores_zero_size() {
    let mut engine = engine_with(HeadlessDevice::new());
    spawn_cube(&mut engine, "cube");
    engine.request_pick(50, 50);

    engine.on_resize(0, 0).expect("minimized");
    assert_eq!(engine.color_target().width, 320);

    engine.on_resize(640, 360).expect("resize");
    assert_eq!(engine.color_target().width, 640);
    assert_eq!(engine.pick_phase(), PickPhase::RequestPending);

    let report = engine.tick_with_delta(0.016).expect("tick");
    assert!(matches!(report.pick, Some(PickResolution::Selected(Some(_)))));
}

#[test]
fn test_failed_resize_keeps_previous_targets() {
    let mut device = HeadlessDevice::new();
    device.set_readback_latency(1);
    let mut engine = engine_with(device);
    let cube = spawn_cube(&mut engine, "cube");
    let recorded = recording(&mut engine);
    let textures = engine.device().texture_count();

    engine.request_pick(10, 10);
    engine.tick_with_delta(0.016).expect("tick");
    assert!(engine.on_resize(40000, 40000).is_err());

    assert_eq!(engine.device().texture_count(), textures);
    assert_eq!(engine.color_target().width, 320);
    assert_eq!(engine.picker().target().width(), 320);
    assert_eq!(engine.pick_phase(), PickPhase::Resolving);

    let report = engine.tick_with_delta(0.016).expect("tick");
    assert_eq!(report.pick, Some(PickResolution::Selected(Some(cube))));
    assert_eq!(recorded.borrow().selections, vec![Some(cube)]);
}

#[test]
fn test_resize_during_pick_leaves_no_readback_behind() {
    let mut device = HeadlessDevice::new();
    device.set_readback_latency(5);
    let mut engine = engine_with(device);
    spawn_cube(&mut engine, "cube");

    for round in 0..10 {
        engine.request_pick(round, round);
        let report = engine.tick_with_delta(0.016).expect("tick");
        assert!(report.pick_encoded);
        engine.on_resize(320 + round as u32, 240).expect("resize");
    }
    assert_eq!(engine.device().pending_readbacks(), 0);
    assert_eq!(engine.pick_phase(), PickPhase::Idle);
}

#[test]
fn test_icon_overlay_toggle() {
    let mut engine = engine_with(HeadlessDevice::new());
    spawn_cube(&mut engine, "a");
    spawn_cube(&mut engine, "b");
    engine.world_mut().spawn_with_transform("marker").expect("spawn");

    engine.set_icons_visible(true);
    let shown = engine.tick_with_delta(0.016).expect("tick");
    assert_eq!(shown.mesh_draws, 2);
    assert_eq!(shown.icon_draws, 3);

    engine.set_icons_visible(false);
    let hidden = engine.tick_with_delta(0.016).expect("tick");
    assert_eq!(hidden.icon_draws, 0);
    assert!(!hidden.pick_encoded);
    assert_eq!(hidden.frame, 2);
}

#[test]
fn test_too_many_instances_is_an_error() {
    let mut device = HeadlessDevice::new();
    let mesh = Arc::new(MeshData::cube().upload(&mut device, "cube").expect("mesh"));
    let mut engine = engine_with(device);
    let capacity = engine.config().max_instances;
    for index in 0..=capacity {
        let id = engine.world_mut().spawn_with_transform(format!("cube {}", index)).expect("spawn");
        engine.world_mut().get_mut(id).expect("entity").attach_mesh(Arc::clone(&mesh));
    }

    assert!(engine.tick_with_delta(0.016).is_err());
}

use approx::assert_relative_eq;

use crate::ecs::behaviours::RotateBehaviour;
use crate::ecs::systems::{collect_frame_instances, BehaviourScheduler};
use crate::ecs::{EntityId, World};
use crate::foundation::math::{utils, Mat4, Vec3};

const COLUMNS: usize = 5;
const SPACING: f32 = 3.0;

fn grid_position(index: usize) -> Vec3 {
    Vec3::new(
        (index % COLUMNS) as f32 * SPACING - 5.0,
        (index / COLUMNS) as f32 * SPACING - 5.0,
        0.0,
    )
}

fn build_grid(world: &mut World) -> (EntityId, Vec<EntityId>) {
    let root = world.spawn_with_transform("root").expect("spawn");
    let children = (0..10)
        .map(|index| {
            let child = world.spawn_with_transform(format!("cube {}", index)).expect("spawn");
            let transform = world.get_mut(child).and_then(|o| o.transform_mut()).expect("transform");
            transform.set_position(grid_position(index));
            transform.set_rotation_from_angle_axis(utils::deg_to_rad(45.0), Vec3::x());
            world.set_parent(child, root).expect("parent");
            child
        })
        .collect();
    (root, children)
}

fn translation(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
}

#[test]
fn test_grid_children_sit_at_local_positions_under_identity_root() {
    let mut world = World::new();
    let (root, children) = build_grid(&mut world);

    assert_eq!(world.get(root).expect("root").children(), children.as_slice());

    let first = world.world_transform(children[0]).expect("world");
    assert_relative_eq!(translation(&first), Vec3::new(-5.0, -5.0, 0.0), epsilon = 1e-5);

    let seventh = world.world_transform(children[7]).expect("world");
    assert_relative_eq!(translation(&seventh), Vec3::new(1.0, -2.0, 0.0), epsilon = 1e-5);
}

#[test]
fn test_moving_root_moves_every_child() {
    let mut world = World::new();
    let (root, children) = build_grid(&mut world);
    world
        .get_mut(root)
        .and_then(|o| o.transform_mut())
        .expect("transform")
        .set_position(Vec3::new(0.0, 0.0, -10.0));

    for (index, child) in children.iter().enumerate() {
        let matrix = world.world_transform(*child).expect("world");
        let expected = grid_position(index) + Vec3::new(0.0, 0.0, -10.0);
        assert_relative_eq!(translation(&matrix), expected, epsilon = 1e-5);
    }
}

#[test]
fn test_rotating_grid_keeps_positions_and_collects_in_spawn_order() {
    let mut world = World::new();
    let (_, children) = build_grid(&mut world);
    for child in &children {
        world
            .get_mut(*child)
            .expect("child")
            .attach_behaviour(RotateBehaviour::with_axis(Vec3::y()));
    }

    let mut scheduler = BehaviourScheduler::new();
    let first = scheduler.run(&mut world, 0.5);
    assert_eq!(first.started, 10);
    assert_eq!(first.updated, 10);
    let second = scheduler.run(&mut world, 0.5);
    assert_eq!(second.started, 0);

    let seventh = world.world_transform(children[7]).expect("world");
    assert_relative_eq!(translation(&seventh), Vec3::new(1.0, -2.0, 0.0), epsilon = 1e-5);

    let icons = collect_frame_instances(&world).icons;
    assert_eq!(icons.len(), 11);
    assert_eq!(icons[0].entity, world.ids()[0]);
    assert_relative_eq!(icons[8].position, grid_position(7), epsilon = 1e-5);
}

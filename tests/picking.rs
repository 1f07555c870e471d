use glam::Vec3;
use scene_render::renderer::state::{GeometryState, MaterialState, ModesState, TransformState};
use scene_render::renderer::{decode_pick_color, encode_pick_index, BufferId, GpuCommand, RenderTarget};
use scene_render::{HeadlessGpu, ObjectKey, ObjectStates, RenderSettings, Renderer};

fn object(
    world: &mut hecs::World,
    renderer: &mut Renderer<HeadlessGpu>,
    geometry: GeometryState,
    modes: ModesState,
) -> (ObjectKey, hecs::Entity) {
    let states = ObjectStates {
        material: renderer.create_state(MaterialState::lambert(Vec3::ONE)),
        geometry: renderer.create_state(geometry),
        transform: renderer.create_state(TransformState::identity()),
        modes: renderer.create_state(modes),
        vertex_bufs: None,
    };
    let entity = world.spawn(());
    (renderer.create_object(entity, states).unwrap(), entity)
}

#[test]
fn pick_colors_round_trip_through_bytes() {
    for index in [1u32, 255, 256, 70_000, 16_777_216] {
        let color = encode_pick_index(index);
        let bytes = color.map(|c| (c * 255.0).round() as u8);
        assert_eq!(decode_pick_color(bytes), Some(index));
    }
    assert_eq!(decode_pick_color([0, 0, 0, 0]), None);
}

#[test]
fn picked_pixel_resolves_to_object_and_entity() {
    let mut world = hecs::World::new();
    let mut renderer = Renderer::new(HeadlessGpu::new(), RenderSettings::default());
    let hidden = ModesState {
        pickable: false,
        ..ModesState::default()
    };
    object(&mut world, &mut renderer, GeometryState::triangles(BufferId(1), 3), hidden);
    let (first, _) = object(
        &mut world,
        &mut renderer,
        GeometryState::triangles(BufferId(2), 3),
        ModesState::default(),
    );
    let (second, second_entity) = object(
        &mut world,
        &mut renderer,
        GeometryState::triangles(BufferId(3), 3),
        ModesState::default(),
    );

    renderer.gpu_mut().set_pick_pixel([2, 0, 0, 0]);
    let hit = renderer.pick_object(10, 20).expect("second pickable object");
    assert_eq!(hit.object, second);
    assert_eq!(hit.entity, second_entity);

    renderer.gpu_mut().set_pick_pixel([1, 0, 0, 0]);
    assert_eq!(renderer.pick_object(0, 0).map(|hit| hit.object), Some(first));

    let commands = renderer.gpu().commands();
    assert!(commands.contains(&GpuCommand::RenderTarget(RenderTarget::Pick)));
    assert!(commands.contains(&GpuCommand::ReadPixel { x: 10, y: 20 }));
    assert_eq!(
        commands.last(),
        Some(&GpuCommand::RenderTarget(RenderTarget::Canvas))
    );
}

#[test]
fn background_and_out_of_range_pixels_pick_nothing() {
    let mut world = hecs::World::new();
    let mut renderer = Renderer::new(HeadlessGpu::new(), RenderSettings::default());
    object(
        &mut world,
        &mut renderer,
        GeometryState::triangles(BufferId(1), 3),
        ModesState::default(),
    );

    renderer.gpu_mut().set_pick_pixel([0, 0, 0, 0]);
    assert!(renderer.pick_object(1, 1).is_none());

    renderer.gpu_mut().set_pick_pixel([9, 0, 0, 0]);
    assert!(renderer.pick_object(1, 1).is_none());
}

#[test]
fn picking_can_be_disabled() {
    let settings = RenderSettings {
        pick_enabled: false,
        ..RenderSettings::default()
    };
    let mut world = hecs::World::new();
    let mut renderer = Renderer::new(HeadlessGpu::new(), settings);
    object(
        &mut world,
        &mut renderer,
        GeometryState::triangles(BufferId(1), 3),
        ModesState::default(),
    );
    renderer.gpu_mut().set_pick_pixel([1, 0, 0, 0]);

    assert!(renderer.pick_object(1, 1).is_none());
    assert_eq!(renderer.gpu().draw_call_count(), 0);
}

#[test]
fn triangle_and_vertex_picks_need_pick_buffers() {
    let mut world = hecs::World::new();
    let mut renderer = Renderer::new(HeadlessGpu::new(), RenderSettings::default());
    let (with_buffers, _) = object(
        &mut world,
        &mut renderer,
        GeometryState::triangles(BufferId(1), 9).with_pick_buffers(
            BufferId(10),
            BufferId(11),
            BufferId(12),
        ),
        ModesState::default(),
    );
    let (without, _) = object(
        &mut world,
        &mut renderer,
        GeometryState::triangles(BufferId(2), 9),
        ModesState::default(),
    );
    renderer.gpu_mut().set_pick_pixel([3, 0, 0, 0]);

    assert_eq!(renderer.pick_triangle(with_buffers, 4, 4), Some(2));
    assert_eq!(renderer.pick_vertex(with_buffers, 4, 4), Some(2));
    assert_eq!(renderer.pick_triangle(without, 4, 4), None);
    assert_eq!(renderer.pick_vertex(without, 4, 4), None);
}

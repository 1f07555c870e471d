use glam::Vec3;
use scene_render::renderer::state::{
    GeometryState, MaterialState, ModesState, StateRef, TransformState,
};
use scene_render::renderer::{BufferId, GpuCommand, TextureId};
use scene_render::{HeadlessGpu, ObjectKey, ObjectStates, RenderSettings, Renderer};

struct Fixture {
    world: hecs::World,
    renderer: Renderer<HeadlessGpu>,
}

impl Fixture {
    fn with_settings(settings: RenderSettings) -> Self {
        Self {
            world: hecs::World::new(),
            renderer: Renderer::new(HeadlessGpu::new(), settings),
        }
    }

    fn new() -> Self {
        Self::with_settings(RenderSettings::default())
    }

    fn object(
        &mut self,
        material: StateRef<MaterialState>,
        geometry: StateRef<GeometryState>,
        modes: ModesState,
    ) -> ObjectKey {
        let transform = self.renderer.create_state(TransformState::identity());
        let modes = self.renderer.create_state(modes);
        let entity = self.world.spawn(());
        self.renderer
            .create_object(
                entity,
                ObjectStates {
                    material,
                    geometry,
                    transform,
                    modes,
                    vertex_bufs: None,
                },
            )
            .unwrap()
    }

    fn order(&self) -> Vec<ObjectKey> {
        self.renderer
            .draw_list()
            .all()
            .iter()
            .map(|entry| entry.object)
            .collect()
    }
}

#[test]
fn draw_order_follows_layer_then_geometry_and_is_stable() {
    let mut f = Fixture::new();
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let g1 = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let g2 = f.renderer.create_state(GeometryState::triangles(BufferId(2), 3));

    let top = f.object(material, g1, ModesState::default().with_layer(1));
    let second = f.object(material, g2, ModesState::default());
    let first = f.object(material, g1, ModesState::default());
    let tie_a = f.object(material, g1, ModesState::default().with_layer(2));
    let tie_b = f.object(material, g1, ModesState::default().with_layer(2));

    f.renderer.render();

    assert_eq!(f.order(), vec![first, second, top, tie_a, tie_b]);
}

#[test]
fn unchanged_frame_skips_resort() {
    let mut f = Fixture::new();
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    f.object(material, geometry, ModesState::default());
    f.object(material, geometry, ModesState::default());

    assert!(f.renderer.render().resorted);
    let sorts = f.renderer.draw_list().sort_count();
    let stats = f.renderer.render();

    assert!(!stats.resorted);
    assert_eq!(f.renderer.draw_list().sort_count(), sorts);
}

#[test]
fn transparent_objects_draw_after_opaque_ones() {
    let mut f = Fixture::new();
    let glass = f
        .renderer
        .create_state(MaterialState::lambert(Vec3::ONE).with_alpha(0.5));
    let solid = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let clear = f.object(glass, geometry, ModesState::default());
    let opaque = f.object(solid, geometry, ModesState::default());

    f.renderer.render();

    let list = f.renderer.draw_list();
    assert_eq!(list.opaque().len(), 1);
    assert_eq!(list.opaque()[0].object, opaque);
    assert_eq!(list.transparent()[0].object, clear);
    assert!(f
        .renderer
        .gpu()
        .commands()
        .contains(&GpuCommand::DepthMask(false)));
}

#[test]
fn shared_material_is_uploaded_once_per_program_bind() {
    let mut f = Fixture::new();
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    f.object(material, geometry, ModesState::default());
    f.object(material, geometry, ModesState::default());
    f.object(material, geometry, ModesState::default());

    let stats = f.renderer.render();
    let gpu = f.renderer.gpu();

    assert_eq!(stats.objects_drawn, 3);
    assert_eq!(stats.program_binds, 1);
    assert_eq!(gpu.use_program_count(), 1);
    assert_eq!(gpu.uniform_set_count("u_materialDiffuse"), 1);
    assert_eq!(gpu.uniform_set_count("u_viewMatrix"), 1);
    assert_eq!(gpu.uniform_set_count("u_modelMatrix"), 3, "transforms differ");
    assert_eq!(gpu.draw_call_count(), 3);
}

#[test]
fn texture_units_wrap_at_the_configured_limit() {
    let settings = RenderSettings {
        max_texture_units: Some(2),
        ..RenderSettings::default()
    };
    let mut f = Fixture::with_settings(settings);
    let material = f.renderer.create_state(
        MaterialState::lambert(Vec3::ONE)
            .with_diffuse_map(TextureId(1))
            .with_emissive_map(TextureId(2))
            .with_occlusion_map(TextureId(3)),
    );
    let geometry = f
        .renderer
        .create_state(GeometryState::triangles(BufferId(1), 3).with_uvs(BufferId(2)));
    f.object(material, geometry, ModesState::default());

    f.renderer.render();

    assert_eq!(f.renderer.gpu().texture_units_used(), vec![0, 1, 0]);
}

#[test]
fn invisible_and_culled_objects_are_not_drawn() {
    let mut f = Fixture::new();
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    f.object(
        material,
        geometry,
        ModesState {
            visible: false,
            ..ModesState::default()
        },
    );
    f.object(
        material,
        geometry,
        ModesState {
            culled: true,
            ..ModesState::default()
        },
    );
    let shown = f.object(material, geometry, ModesState::default());

    let stats = f.renderer.render();

    assert_eq!(stats.objects, 3);
    assert_eq!(stats.objects_drawn, 1);
    assert_eq!(f.order(), vec![shown]);
}

#[test]
fn emphasis_passes_run_for_flagged_objects() {
    let mut f = Fixture::new();
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f.renderer.create_state(
        GeometryState::triangles(BufferId(1), 3).with_edge_indices(BufferId(3), 6),
    );
    let ghost = f.object(
        material,
        geometry,
        ModesState {
            xrayed: true,
            ..ModesState::default()
        },
    );
    f.object(
        material,
        geometry,
        ModesState {
            selected: true,
            outlined: true,
            ..ModesState::default()
        },
    );

    let stats = f.renderer.render();

    assert_eq!(stats.objects_drawn, 1, "xrayed objects skip the normal pass");
    assert!(f.renderer.gpu().uniform_set_count("u_fillColor") >= 1);
    assert!(f.renderer.gpu().uniform_set_count("u_edgeColor") >= 1);
    assert!(f.renderer.gpu().uniform_set_count("u_width") >= 1);
    let object = f.renderer.object(ghost).unwrap();
    assert!(object
        .program(f.renderer.programs(), scene_render::renderer::PassKind::EmphasisFill)
        .is_some());
}

use glam::Vec3;
use scene_render::renderer::state::{
    GeometryState, MaterialState, ModesState, StructureChange, TransformState,
};
use scene_render::renderer::{BufferId, PassKind, TextureId};
use scene_render::{HeadlessGpu, ObjectKey, ObjectStates, RenderSettings, Renderer};

struct Fixture {
    world: hecs::World,
    renderer: Renderer<HeadlessGpu>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            world: hecs::World::new(),
            renderer: Renderer::new(HeadlessGpu::new(), RenderSettings::default()),
        }
    }

    fn object(
        &mut self,
        material: scene_render::renderer::StateRef<MaterialState>,
        geometry: scene_render::renderer::StateRef<GeometryState>,
    ) -> ObjectKey {
        let transform = self.renderer.create_state(TransformState::identity());
        let modes = self.renderer.create_state(ModesState::default());
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
            .expect("fragments exist")
    }

    fn draw_program_id(&self, key: ObjectKey) -> u32 {
        self.renderer
            .object(key)
            .and_then(|object| object.program(self.renderer.programs(), PassKind::Draw))
            .map(|program| program.id())
            .expect("draw program acquired")
    }
}

#[test]
fn equal_structure_shares_one_program() {
    let mut f = Fixture::new();
    let geometry = f
        .renderer
        .create_state(GeometryState::triangles(BufferId(1), 3).with_normals(BufferId(2)));
    let red = f.renderer.create_state(MaterialState::lambert(Vec3::X));
    let blue = f.renderer.create_state(MaterialState::lambert(Vec3::Z));
    let a = f.object(red, geometry);
    let b = f.object(blue, geometry);

    f.renderer.render();

    assert_eq!(f.draw_program_id(a), f.draw_program_id(b));
    assert_eq!(f.renderer.programs().len_of(PassKind::Draw), 1);
    assert_eq!(f.renderer.gpu().programs_created(), 1);
    let hash = f.renderer.object(a).unwrap().pass_hash(PassKind::Draw).unwrap();
    assert_eq!(f.renderer.programs().use_count(PassKind::Draw, hash), Some(2));
}

#[test]
fn program_is_deleted_once_after_last_release() {
    let mut f = Fixture::new();
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let a = f.object(material, geometry);
    let b = f.object(material, geometry);
    f.renderer.render();

    assert!(f.renderer.destroy_object(a));
    assert_eq!(f.renderer.gpu().programs_deleted(), 0, "b still uses the program");
    assert!(!f.renderer.destroy_object(a), "second destroy is a no-op");

    assert!(f.renderer.destroy_object(b));
    assert_eq!(f.renderer.gpu().programs_deleted(), 1);
    assert_eq!(f.renderer.gpu().live_programs(), 0);
    assert!(f.renderer.programs().is_empty());
}

#[test]
fn scalar_changes_never_recompile() {
    let mut f = Fixture::new();
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let material = f.renderer.create_state(MaterialState::phong(Vec3::ONE));
    f.object(material, geometry);
    f.renderer.render();

    for step in 0..5 {
        let change = f
            .renderer
            .update_state(material, |m| {
                m.diffuse = Vec3::splat(step as f32 / 5.0);
                m.shininess = 10.0 + step as f32;
            })
            .unwrap();
        assert_eq!(change, StructureChange::Unchanged);
        f.renderer.render();
    }

    assert_eq!(f.renderer.programs().compile_count(), 1);
    assert_eq!(f.renderer.gpu().programs_created(), 1);
}

#[test]
fn structural_change_moves_only_the_changed_object() {
    let mut f = Fixture::new();
    let geometry = f
        .renderer
        .create_state(GeometryState::triangles(BufferId(1), 3).with_uvs(BufferId(2)));
    let shared = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let own = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let a = f.object(own, geometry);
    let b = f.object(shared, geometry);
    f.renderer.render();
    let before = f.draw_program_id(b);

    let change = f
        .renderer
        .update_state(own, |m| m.diffuse_map = Some(TextureId(4)))
        .unwrap();
    assert_eq!(change, StructureChange::Rehashed);
    f.renderer.render();

    assert_ne!(f.draw_program_id(a), f.draw_program_id(b));
    assert_eq!(f.draw_program_id(b), before);
    assert_eq!(f.renderer.programs().compile_count(), 2);
    assert_eq!(f.renderer.gpu().programs_deleted(), 0);

    // Detaching the map returns to the cached program and frees the textured one
    f.renderer.update_state(own, |m| m.diffuse_map = None).unwrap();
    f.renderer.render();

    assert_eq!(f.draw_program_id(a), before);
    assert_eq!(f.renderer.programs().compile_count(), 2);
    assert_eq!(f.renderer.gpu().programs_deleted(), 1);
}

#[test]
fn scene_light_change_recompiles_every_object() {
    use scene_render::renderer::state::Light;

    let mut f = Fixture::new();
    let geometry = f
        .renderer
        .create_state(GeometryState::triangles(BufferId(1), 3).with_normals(BufferId(2)));
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let a = f.object(material, geometry);
    let b = f.object(material, geometry);
    f.renderer.render();

    let lights = f.renderer.lights();
    let change = f
        .renderer
        .update_state(lights, |l| {
            l.lights.push(Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0))
        })
        .unwrap();
    assert_eq!(change, StructureChange::Rehashed);
    f.renderer.render();

    assert_eq!(f.draw_program_id(a), f.draw_program_id(b));
    assert_eq!(f.renderer.programs().compile_count(), 2);
    assert_eq!(f.renderer.gpu().programs_deleted(), 1);
}

#[test]
fn destroying_required_fragment_destroys_dependents() {
    let mut f = Fixture::new();
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let other = f.renderer.create_state(GeometryState::triangles(BufferId(5), 6));
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let a = f.object(material, geometry);
    let b = f.object(material, other);
    f.renderer.render();

    f.renderer.destroy_state(geometry).unwrap();

    assert!(f.renderer.object(a).is_none());
    assert!(f.renderer.object(b).is_some());
    assert!(f.renderer.destroy_state(geometry).is_err());
}

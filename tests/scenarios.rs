use glam::{Mat4, Vec3};
use scene_render::renderer::state::{
    AlphaMode, GeometryState, Light, MaterialState, ModesState, ShadowSource, StateRef,
    TransformState, VertexBufsState,
};
use scene_render::renderer::{BufferId, GpuCommand, PassKind, RenderTarget, TextureId};
use scene_render::{
    HeadlessGpu, ObjectKey, ObjectStates, RenderError, RenderSettings, Renderer,
};

struct Fixture {
    world: hecs::World,
    renderer: Renderer<HeadlessGpu>,
    modes: StateRef<ModesState>,
}

impl Fixture {
    fn with_gpu(gpu: HeadlessGpu) -> Self {
        let mut renderer = Renderer::new(gpu, RenderSettings::default());
        let modes = renderer.create_state(ModesState::default());
        Self {
            world: hecs::World::new(),
            renderer,
            modes,
        }
    }

    fn new() -> Self {
        Self::with_gpu(HeadlessGpu::new())
    }

    fn object(
        &mut self,
        material: StateRef<MaterialState>,
        geometry: StateRef<GeometryState>,
    ) -> ObjectKey {
        self.batched_object(material, geometry, None)
    }

    fn batched_object(
        &mut self,
        material: StateRef<MaterialState>,
        geometry: StateRef<GeometryState>,
        vertex_bufs: Option<StateRef<VertexBufsState>>,
    ) -> ObjectKey {
        let transform = self.renderer.create_state(TransformState::identity());
        let entity = self.world.spawn(());
        self.renderer
            .create_object(
                entity,
                ObjectStates {
                    material,
                    geometry,
                    transform,
                    modes: self.modes,
                    vertex_bufs,
                },
            )
            .unwrap()
    }

    fn hash(&self, key: ObjectKey) -> String {
        self.renderer
            .object(key)
            .and_then(|object| object.pass_hash(PassKind::Draw))
            .map(str::to_string)
            .expect("draw program acquired")
    }
}

#[test]
fn structurally_equal_geometries_share_material_hash() {
    let mut f = Fixture::new();
    let m1 = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let m2 = f.renderer.create_state(MaterialState::phong(Vec3::ONE));
    let g1 = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let g2 = f.renderer.create_state(GeometryState::triangles(BufferId(2), 6));
    let o1 = f.object(m1, g1);
    let o2 = f.object(m1, g2);
    let o3 = f.object(m2, g1);

    f.renderer.render();

    assert_eq!(f.hash(o1), f.hash(o2));
    assert_ne!(f.hash(o1), f.hash(o3));
    assert_eq!(f.renderer.programs().len_of(PassKind::Draw), 2);

    f.renderer.destroy_object(o1);
    f.renderer.destroy_object(o2);

    assert_eq!(f.renderer.programs().len(), 1);
    let survivor = f.hash(o3);
    assert_eq!(
        f.renderer.programs().use_count(PassKind::Draw, &survivor),
        Some(1)
    );
    assert_eq!(f.renderer.gpu().programs_deleted(), 1);
}

#[test]
fn differing_geometry_features_split_hashes() {
    let mut f = Fixture::new();
    let m1 = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let m2 = f.renderer.create_state(MaterialState::phong(Vec3::ONE));
    let g1 = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let g2 = f
        .renderer
        .create_state(GeometryState::triangles(BufferId(2), 3).with_normals(BufferId(3)));
    let o1 = f.object(m1, g1);
    let o2 = f.object(m1, g2);
    let o3 = f.object(m2, g1);

    f.renderer.render();

    let hashes = [f.hash(o1), f.hash(o2), f.hash(o3)];
    assert_ne!(hashes[0], hashes[1]);
    assert_ne!(hashes[0], hashes[2]);
    assert_ne!(hashes[1], hashes[2]);

    f.renderer.destroy_object(o1);
    f.renderer.destroy_object(o2);

    assert_eq!(f.renderer.programs().len(), 1);
    assert!(f.renderer.programs().find(PassKind::Draw, &hashes[2]).is_some());
    assert_eq!(f.renderer.gpu().live_programs(), 1);
}

#[test]
fn failed_compile_skips_only_the_broken_object() {
    let mut gpu = HeadlessGpu::new();
    gpu.fail_compiles_containing("u_alphaCutoff");
    let mut f = Fixture::with_gpu(gpu);
    let masked = f
        .renderer
        .create_state(MaterialState::lambert(Vec3::ONE).with_alpha_mask(0.5));
    let plain = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let broken = f.object(masked, geometry);
    let healthy = f.object(plain, geometry);

    let stats = f.renderer.render();

    assert_eq!(stats.objects_drawn, 1);
    assert_eq!(stats.failed_draws, 1);
    let errors = f.renderer.object_errors(broken).unwrap();
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|e| e.contains("u_alphaCutoff")));
    assert!(f.renderer.object_errors(healthy).unwrap().is_empty());
    match f.renderer.object_error(broken) {
        Some(RenderError::ShaderCompile { pass, errors, .. }) => {
            assert_eq!(pass, PassKind::Draw);
            assert!(!errors.is_empty());
        }
        other => panic!("expected a compile error, got {other:?}"),
    }

    // The failure is cached, not retried every frame
    let compiles = f.renderer.programs().compile_count();
    f.renderer.render();
    assert_eq!(f.renderer.programs().compile_count(), compiles);

    f.renderer.destroy_object(broken);
    assert!(matches!(
        f.renderer.object_errors(broken),
        Err(RenderError::UnknownObject)
    ));
}

#[test]
fn structural_fix_clears_compile_errors() {
    let mut gpu = HeadlessGpu::new();
    gpu.fail_compiles_containing("u_alphaCutoff");
    let mut f = Fixture::with_gpu(gpu);
    let material = f
        .renderer
        .create_state(MaterialState::lambert(Vec3::ONE).with_alpha_mask(0.5));
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let key = f.object(material, geometry);

    let stats = f.renderer.render();
    assert_eq!(stats.failed_draws, 1);
    assert!(!f.renderer.object_errors(key).unwrap().is_empty());

    f.renderer
        .update_state(material, |m| m.alpha_mode = AlphaMode::Opaque)
        .unwrap();
    f.renderer.gpu_mut().clear_commands();
    let stats = f.renderer.render();

    assert_eq!(stats.objects_drawn, 1);
    assert_eq!(stats.failed_draws, 0);
    assert_eq!(f.renderer.gpu().draw_call_count(), 1);
    assert!(f.renderer.object_errors(key).unwrap().is_empty());
    assert!(f.renderer.object_error(key).is_none());
}

#[test]
fn shared_vertex_buffers_select_the_program_variant() {
    let mut f = Fixture::new();
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f.renderer.create_state(GeometryState::triangles(BufferId(1), 3));
    let shared = f.renderer.create_state(VertexBufsState {
        positions: Some(BufferId(20)),
        normals: Some(BufferId(21)),
        positions_decode_matrix: Some(Mat4::from_scale(Vec3::splat(0.5))),
        ..VertexBufsState::default()
    });
    let plain = f.object(material, geometry);
    let batched = f.batched_object(material, geometry, Some(shared));

    f.renderer.render();

    assert_ne!(f.hash(plain), f.hash(batched));
    assert!(f.renderer.gpu().uniform_set_count("u_positionsDecodeMatrix") > 0);
    let commands = f.renderer.gpu().commands();
    assert!(commands.contains(&GpuCommand::BindAttribute {
        name: "a_normal".to_string(),
        buffer: BufferId(21),
    }));
    assert!(commands.contains(&GpuCommand::BindAttribute {
        name: "a_position".to_string(),
        buffer: BufferId(20),
    }));
}

#[test]
fn shadow_casting_light_renders_into_its_map() {
    let mut f = Fixture::new();
    let lights = f.renderer.lights();
    f.renderer
        .update_state(lights, |l| {
            l.lights.push(
                Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0).with_shadow(ShadowSource {
                    view_matrix: Mat4::IDENTITY,
                    projection_matrix: Mat4::IDENTITY,
                    map: TextureId(9),
                }),
            )
        })
        .unwrap();
    let material = f.renderer.create_state(MaterialState::lambert(Vec3::ONE));
    let geometry = f
        .renderer
        .create_state(GeometryState::triangles(BufferId(1), 3).with_normals(BufferId(2)));
    let key = f.object(material, geometry);

    let stats = f.renderer.render();
    let commands = f.renderer.gpu().commands();

    assert!(commands.contains(&GpuCommand::RenderTarget(RenderTarget::Texture(TextureId(9)))));
    assert!(commands.contains(&GpuCommand::BindTexture {
        name: "u_shadowMap0".to_string(),
        texture: TextureId(9),
        unit: 0,
    }));
    assert!(f
        .renderer
        .object(key)
        .unwrap()
        .program(f.renderer.programs(), PassKind::Shadow)
        .is_some());
    assert_eq!(stats.passes, 2, "shadow and normal passes");
}

#[test]
fn disabling_shadows_skips_the_shadow_pass() {
    let settings = RenderSettings {
        shadows: false,
        ..RenderSettings::default()
    };
    let mut renderer = Renderer::new(HeadlessGpu::new(), settings);
    let lights = renderer.lights();
    renderer
        .update_state(lights, |l| {
            l.lights.push(
                Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0).with_shadow(ShadowSource {
                    view_matrix: Mat4::IDENTITY,
                    projection_matrix: Mat4::IDENTITY,
                    map: TextureId(9),
                }),
            )
        })
        .unwrap();

    let stats = renderer.render();

    assert_eq!(stats.passes, 1);
    assert!(!renderer
        .gpu()
        .commands()
        .contains(&GpuCommand::RenderTarget(RenderTarget::Texture(TextureId(9)))));
}

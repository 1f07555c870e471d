use glam::Vec3;
use scene_render::renderer::state::{GeometryState, MaterialState, ModesState, TransformState};
use scene_render::renderer::{BufferId, PassKind};
use scene_render::{HeadlessGpu, ObjectStates, RenderSettings, Renderer};

fn temp_settings_file(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "scene_render_{}_{}.json",
        name,
        std::process::id()
    ));
    std::fs::write(&path, contents).expect("write temp settings");
    path
}

#[test]
fn settings_file_is_loaded_and_validated() {
    let path = temp_settings_file(
        "valid",
        r#"{ "canvas_id": "viewer", "gamma_output": true, "gamma_factor": -1.0, "max_texture_units": 4 }"#,
    );

    let settings = RenderSettings::try_load_from_path(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(settings.canvas_id, "viewer");
    assert!(settings.gamma_output);
    assert_eq!(settings.gamma_factor, 2.2, "non-positive gamma is replaced");
    assert_eq!(settings.max_texture_units, Some(4));
}

#[test]
fn malformed_file_falls_back_to_defaults() {
    let path = temp_settings_file("malformed", "{ \"canvas_id\": ");

    assert!(RenderSettings::try_load_from_path(&path).is_err());
    let settings = RenderSettings::load_from_path(&path);
    std::fs::remove_file(&path).ok();

    assert_eq!(settings, RenderSettings::default());
}

#[test]
fn canvas_and_gamma_feed_the_program_hash() {
    scene_render::init_logging();

    let hash_for = |settings: RenderSettings| {
        let mut world = hecs::World::new();
        let mut renderer = Renderer::new(HeadlessGpu::new(), settings);
        let states = ObjectStates {
            material: renderer.create_state(MaterialState::lambert(Vec3::ONE)),
            geometry: renderer.create_state(GeometryState::triangles(BufferId(1), 3)),
            transform: renderer.create_state(TransformState::identity()),
            modes: renderer.create_state(ModesState::default()),
            vertex_bufs: None,
        };
        let key = renderer.create_object(world.spawn(()), states).unwrap();
        renderer.render();
        renderer
            .object(key)
            .and_then(|object| object.pass_hash(PassKind::Draw))
            .map(str::to_string)
            .unwrap()
    };

    let base = hash_for(RenderSettings::default());
    let other_canvas = hash_for(RenderSettings {
        canvas_id: "second".to_string(),
        ..RenderSettings::default()
    });
    let gamma = hash_for(RenderSettings {
        gamma_output: true,
        ..RenderSettings::default()
    });

    assert!(base.starts_with("canvas;"));
    assert!(other_canvas.starts_with("second;"));
    assert_ne!(base, gamma);
}

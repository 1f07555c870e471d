// renderer/renderer.rs
use rustc_hash::FxHashSet;
use slotmap::SlotMap;

use crate::error::{RenderError, Result};
use crate::renderer::camera::Camera;
use crate::renderer::draw_list::{DrawEntry, DrawKey, DrawList};
use crate::renderer::frame::{decode_pick_color, Frame};
use crate::renderer::gpu::{Gpu, RenderTarget};
use crate::renderer::object::{DrawOutcome, ObjectKey, ObjectStates, PassContext, RenderObject};
use crate::renderer::passes::{ProgramCache, SceneContext, SceneFeatures};
use crate::renderer::state::{
    Appearance, ClipsState, EmphasisMaterialState, IdMap, LightsState, ModesState,
    OutlineMaterialState, PooledState, State, StateFactory, StateId, StateRef, StructureChange,
};
use crate::settings::RenderSettings;

/// Counters for the last rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub objects: usize,
    /// Objects drawn by the normal pass.
    pub objects_drawn: u32,
    /// Pass invocations skipped because their program failed to compile.
    pub failed_draws: u32,
    pub draw_calls: u32,
    pub program_binds: u32,
    pub texture_binds: u32,
    pub passes: u32,
    pub programs: usize,
    pub compiles: usize,
    pub resorted: bool,
}

impl RendererStats {
    fn tally(&mut self, outcome: DrawOutcome) {
        if outcome == DrawOutcome::Failed {
            self.failed_draws += 1;
        }
    }

    fn add_pass(&mut self, frame: &Frame) {
        self.draw_calls += frame.draw_calls();
        self.program_binds += frame.program_binds;
        self.texture_binds += frame.texture_binds;
        self.passes += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickResult {
    pub object: ObjectKey,
    pub entity: hecs::Entity,
}

#[derive(Clone, Copy)]
enum PickPrimitive {
    Triangle,
    Vertex,
}

/// Scene-wide fragments every pass reads.
struct SceneStates {
    lights: StateRef<LightsState>,
    clips: StateRef<ClipsState>,
    emphasis: [StateRef<EmphasisMaterialState>; 3],
    outline: StateRef<OutlineMaterialState>,
}

impl SceneStates {
    fn new(states: &mut StateFactory) -> Self {
        Self {
            lights: states.create(LightsState::default()),
            clips: states.create(ClipsState::default()),
            emphasis: Appearance::ALL
                .map(|appearance| states.create(EmphasisMaterialState::for_appearance(appearance))),
            outline: states.create(OutlineMaterialState::default()),
        }
    }

    fn contains(&self, id: StateId) -> bool {
        self.lights.id() == id
            || self.clips.id() == id
            || self.outline.id() == id
            || self.emphasis.iter().any(|e| e.id() == id)
    }

    /// Recreates whichever scene fragment carried `id` after it was destroyed.
    fn replace(&mut self, states: &mut StateFactory, id: StateId) {
        if self.lights.id() == id {
            self.lights = states.create(LightsState::default());
        }
        if self.clips.id() == id {
            self.clips = states.create(ClipsState::default());
        }
        if self.outline.id() == id {
            self.outline = states.create(OutlineMaterialState::default());
        }
        for (appearance, slot) in Appearance::ALL.iter().zip(self.emphasis.iter_mut()) {
            if slot.id() == id {
                *slot = states.create(EmphasisMaterialState::for_appearance(*appearance));
            }
        }
    }

    fn resolve<'a>(
        &self,
        states: &'a StateFactory,
        camera: &'a Camera,
        settings: &'a RenderSettings,
    ) -> Option<SceneContext<'a>> {
        let mut features = SceneFeatures::empty();
        features.set(SceneFeatures::GAMMA_OUTPUT, settings.gamma_output);
        features.set(SceneFeatures::SHADOWS, settings.shadows);

        let emphasis: [&'a State<EmphasisMaterialState>; 3] = [
            states.get(self.emphasis[0])?,
            states.get(self.emphasis[1])?,
            states.get(self.emphasis[2])?,
        ];
        Some(SceneContext {
            canvas_id: &settings.canvas_id,
            features,
            gamma_factor: settings.gamma_factor,
            camera,
            lights: states.get(self.lights)?,
            clips: states.get(self.clips)?,
            emphasis,
            outline: states.get(self.outline)?,
        })
    }
}

/// Owns the GPU, every state fragment, the program cache and the render
/// objects, and drives the per-frame passes.
pub struct Renderer<G: Gpu> {
    gpu: G,
    settings: RenderSettings,
    states: StateFactory,
    programs: ProgramCache,
    objects: SlotMap<ObjectKey, RenderObject>,
    object_ids: IdMap,
    scene: SceneStates,
    camera: Camera,
    draw_list: DrawList,
    rebuild_queue: Vec<ObjectKey>,
    queued: FxHashSet<ObjectKey>,
    max_texture_units: u32,
    stats: RendererStats,
}

impl<G: Gpu> Renderer<G> {
    pub fn new(gpu: G, settings: RenderSettings) -> Self {
        let settings = settings.validate();
        let max_texture_units = settings
            .max_texture_units
            .unwrap_or_else(|| gpu.max_texture_image_units())
            .max(1);
        let mut states = StateFactory::new();
        let scene = SceneStates::new(&mut states);
        log::info!(
            "Renderer created for canvas '{}' ({} texture units)",
            settings.canvas_id,
            max_texture_units
        );

        Self {
            gpu,
            settings,
            states,
            programs: ProgramCache::new(),
            objects: SlotMap::with_key(),
            object_ids: IdMap::new(),
            scene,
            camera: Camera::default(),
            draw_list: DrawList::new(),
            rebuild_queue: Vec::new(),
            queued: FxHashSet::default(),
            max_texture_units,
            stats: RendererStats::default(),
        }
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn states(&self) -> &StateFactory {
        &self.states
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn lights(&self) -> StateRef<LightsState> {
        self.scene.lights
    }

    pub fn clips(&self) -> StateRef<ClipsState> {
        self.scene.clips
    }

    pub fn emphasis_material(&self, appearance: Appearance) -> StateRef<EmphasisMaterialState> {
        self.scene.emphasis[appearance.index()]
    }

    pub fn outline_material(&self) -> StateRef<OutlineMaterialState> {
        self.scene.outline
    }

    pub fn create_state<S: PooledState>(&mut self, value: S) -> StateRef<S> {
        self.states.create(value)
    }

    pub fn state<S: PooledState>(&self, state: StateRef<S>) -> Option<&State<S>> {
        self.states.get(state)
    }

    /// Mutates a fragment. Objects depending on it are queued for a rebuild
    /// when its structure changed.
    pub fn update_state<S: PooledState>(
        &mut self,
        state: StateRef<S>,
        mutate: impl FnOnce(&mut S),
    ) -> Result<StructureChange> {
        let change = self
            .states
            .update(state, mutate)
            .ok_or(RenderError::UnknownState {
                kind: S::KIND,
                id: state.id(),
            })?;
        if change == StructureChange::Rehashed {
            self.queue_dependents(state.id());
        }
        Ok(change)
    }

    /// Destroys a fragment. Objects that required it are destroyed; objects
    /// that only referenced it optionally drop the reference. Scene-level
    /// fragments are replaced by defaults.
    pub fn destroy_state<S: PooledState>(&mut self, state: StateRef<S>) -> Result<()> {
        let id = state.id();
        if self.states.destroy(state).is_none() {
            return Err(RenderError::UnknownState { kind: S::KIND, id });
        }

        if self.scene.contains(id) {
            log::debug!("Scene {} state {} destroyed; restoring default", S::KIND, id);
            self.scene.replace(&mut self.states, id);
            self.queue_all();
            return Ok(());
        }

        let dependents: Vec<(ObjectKey, bool)> = self
            .objects
            .iter()
            .filter(|(_, object)| object.states().references(id))
            .map(|(key, object)| (key, object.states().requires(id)))
            .collect();
        for (key, required) in dependents {
            if required {
                log::debug!(
                    "{} state {} destroyed while referenced; destroying its object",
                    S::KIND,
                    id
                );
                self.destroy_object(key);
            } else if let Some(object) = self.objects.get_mut(key) {
                log::debug!("{} state {} destroyed; object {} drops it", S::KIND, id, object.id());
                object.clear_vertex_bufs();
                self.queue(key);
            }
        }
        Ok(())
    }

    fn check_states(&self, states: &ObjectStates) -> Result<()> {
        fn missing<S: PooledState>(r: StateRef<S>) -> RenderError {
            RenderError::UnknownState {
                kind: S::KIND,
                id: r.id(),
            }
        }

        if !self.states.contains(states.material) {
            return Err(missing(states.material));
        }
        if !self.states.contains(states.geometry) {
            return Err(missing(states.geometry));
        }
        if !self.states.contains(states.transform) {
            return Err(missing(states.transform));
        }
        if !self.states.contains(states.modes) {
            return Err(missing(states.modes));
        }
        if let Some(vertex_bufs) = states.vertex_bufs {
            if !self.states.contains(vertex_bufs) {
                return Err(missing(vertex_bufs));
            }
        }
        Ok(())
    }

    pub fn create_object(&mut self, entity: hecs::Entity, states: ObjectStates) -> Result<ObjectKey> {
        self.check_states(&states)?;
        let id = self.object_ids.allocate();
        let key = self
            .objects
            .insert(RenderObject::new(id, entity, states));
        log::debug!("Created render object {} for entity {:?}", id, entity);
        self.queue(key);
        Ok(key)
    }

    /// Points an object at different fragments.
    pub fn update_object(&mut self, key: ObjectKey, states: ObjectStates) -> Result<()> {
        self.check_states(&states)?;
        let object = self.objects.get_mut(key).ok_or(RenderError::UnknownObject)?;
        object.set_states(states);
        self.queue(key);
        Ok(())
    }

    /// Removes an object and releases all of its programs.
    pub fn destroy_object(&mut self, key: ObjectKey) -> bool {
        let Some(mut object) = self.objects.remove(key) else {
            return false;
        };
        object.destroy(&mut self.gpu, &mut self.programs);
        self.object_ids.release(object.id());
        log::debug!("Destroyed render object {}", object.id());
        true
    }

    pub fn object(&self, key: ObjectKey) -> Option<&RenderObject> {
        self.objects.get(key)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &RenderObject)> {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object_errors(&self, key: ObjectKey) -> Result<Vec<String>> {
        self.objects
            .get(key)
            .map(RenderObject::errors)
            .ok_or(RenderError::UnknownObject)
    }

    /// The object's first current compile failure as an error value.
    pub fn object_error(&self, key: ObjectKey) -> Option<RenderError> {
        let failure = self.objects.get(key)?.failures().next()?;
        Some(RenderError::ShaderCompile {
            pass: failure.pass,
            hash: failure.hash.clone(),
            errors: failure.errors.clone(),
        })
    }

    fn queue(&mut self, key: ObjectKey) {
        if self.queued.insert(key) {
            self.rebuild_queue.push(key);
        }
    }

    fn queue_all(&mut self) {
        let keys: Vec<ObjectKey> = self.objects.keys().collect();
        for key in keys {
            self.queue(key);
        }
    }

    fn queue_dependents(&mut self, id: StateId) {
        if self.scene.contains(id) {
            self.queue_all();
            return;
        }
        let keys: Vec<ObjectKey> = self
            .objects
            .iter()
            .filter(|(_, object)| object.states().references(id))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.queue(key);
        }
    }

    /// Runs queued rebuilds in the order they were queued. Objects destroyed
    /// since are skipped. Returns how many objects were rebuilt.
    pub fn tick(&mut self) -> usize {
        if self.rebuild_queue.is_empty() {
            return 0;
        }
        let queue = std::mem::take(&mut self.rebuild_queue);
        self.queued.clear();

        let Some(scene) = self
            .scene
            .resolve(&self.states, &self.camera, &self.settings)
        else {
            log::warn!("Scene states unavailable; dropping {} rebuilds", queue.len());
            return 0;
        };
        let mut ctx = PassContext {
            gpu: &mut self.gpu,
            programs: &mut self.programs,
            states: &self.states,
            scene,
        };

        let mut rebuilt = 0;
        for key in queue {
            if let Some(object) = self.objects.get_mut(key) {
                object.prepare(&mut ctx);
                rebuilt += 1;
            }
        }
        rebuilt
    }

    /// Renders one frame: shadow maps, the normal pass (opaque then
    /// transparent), the three emphasis passes and outlines.
    pub fn render(&mut self) -> RendererStats {
        self.tick();

        let Self {
            gpu,
            settings,
            states,
            programs,
            objects,
            scene,
            camera,
            draw_list,
            max_texture_units,
            stats,
            ..
        } = self;
        let states = &*states;

        let Some(scene) = scene.resolve(states, camera, settings) else {
            log::warn!("Scene states unavailable; skipping frame");
            return *stats;
        };
        let mut ctx = PassContext {
            gpu,
            programs,
            states,
            scene,
        };

        let mut entries = Vec::with_capacity(objects.len());
        for (key, object) in objects.iter_mut() {
            let Some(modes) = object.modes(states) else {
                continue;
            };
            if !modes.is_drawable() {
                continue;
            }
            let Some(program) = object.prepare(&mut ctx) else {
                continue;
            };
            let Some(resolved) = object.resolve(states) else {
                continue;
            };
            entries.push(DrawEntry {
                key: DrawKey {
                    layer: modes.layer,
                    program,
                    material: resolved.material.id(),
                    vertex_bufs: resolved.vertex_bufs.map_or(0, |v| v.id().0),
                    geometry: resolved.geometry.id(),
                },
                object: key,
                transparent: resolved.material.is_transparent() || modes.colorize[3] < 1.0,
            });
        }

        let mut frame_stats = RendererStats {
            objects: objects.len(),
            resorted: draw_list.update(entries, settings.transparent_sort),
            ..RendererStats::default()
        };
        let mut frame = Frame::new(*max_texture_units);

        if settings.shadows {
            let casters: Vec<_> = scene
                .lights
                .shadow_casters()
                .filter_map(|(i, light)| light.shadow().map(|s| (i, s.map)))
                .collect();
            for (light, map) in casters {
                frame.reset();
                ctx.gpu.set_render_target(RenderTarget::Texture(map));
                ctx.gpu.clear([1.0; 4]);
                for entry in draw_list.all() {
                    if let Some(object) = objects.get_mut(entry.object) {
                        frame_stats.tally(object.draw_shadow(&mut ctx, &mut frame, light));
                    }
                }
                frame_stats.add_pass(&frame);
            }
        }

        frame.reset();
        ctx.gpu.set_render_target(RenderTarget::Canvas);
        ctx.gpu.clear(settings.clear_color);
        ctx.gpu.set_blend(false);
        ctx.gpu.set_depth_mask(true);
        for entry in draw_list.opaque() {
            draw_normal(&mut ctx, &mut frame, objects, entry, &mut frame_stats);
        }
        if !draw_list.transparent().is_empty() {
            ctx.gpu.set_blend(true);
            ctx.gpu.set_depth_mask(false);
            for entry in draw_list.transparent() {
                draw_normal(&mut ctx, &mut frame, objects, entry, &mut frame_stats);
            }
            ctx.gpu.set_depth_mask(true);
        }
        frame_stats.add_pass(&frame);

        for appearance in Appearance::ALL {
            let targets: Vec<ObjectKey> = draw_list
                .all()
                .iter()
                .filter(|entry| {
                    objects
                        .get(entry.object)
                        .and_then(|object| object.modes(states))
                        .is_some_and(|modes| is_emphasized(modes, appearance))
                })
                .map(|entry| entry.object)
                .collect();
            if targets.is_empty() {
                continue;
            }

            let material = scene.emphasis_material(appearance);
            frame.reset();
            ctx.gpu.set_blend(true);
            if material.fill {
                for key in &targets {
                    if let Some(object) = objects.get_mut(*key) {
                        frame_stats.tally(object.draw_emphasis_fill(&mut ctx, &mut frame, appearance));
                    }
                }
            }
            if material.edges {
                for key in &targets {
                    if let Some(object) = objects.get_mut(*key) {
                        frame_stats.tally(object.draw_emphasis_edges(&mut ctx, &mut frame, appearance));
                    }
                }
            }
            if material.vertices {
                for key in &targets {
                    if let Some(object) = objects.get_mut(*key) {
                        frame_stats.tally(object.draw_emphasis_vertices(
                            &mut ctx,
                            &mut frame,
                            appearance,
                        ));
                    }
                }
            }
            ctx.gpu.set_blend(false);
            frame_stats.add_pass(&frame);
        }

        let outlined: Vec<ObjectKey> = draw_list
            .all()
            .iter()
            .filter(|entry| {
                objects
                    .get(entry.object)
                    .and_then(|object| object.modes(states))
                    .is_some_and(|modes| modes.outlined)
            })
            .map(|entry| entry.object)
            .collect();
        if !outlined.is_empty() {
            frame.reset();
            for key in outlined {
                if let Some(object) = objects.get_mut(key) {
                    frame_stats.tally(object.draw_outline(&mut ctx, &mut frame));
                }
            }
            frame_stats.add_pass(&frame);
        }

        frame_stats.programs = ctx.programs.len();
        frame_stats.compiles = ctx.programs.compile_count();
        *stats = frame_stats;
        log::trace!(
            "Frame: {} objects, {} draw calls, {} program binds",
            frame_stats.objects,
            frame_stats.draw_calls,
            frame_stats.program_binds
        );
        frame_stats
    }

    /// Renders pickable objects with colour-coded ids and decodes the pixel
    /// at `(x, y)`.
    pub fn pick_object(&mut self, x: u32, y: u32) -> Option<PickResult> {
        if !self.settings.pick_enabled {
            return None;
        }
        self.tick();

        let Self {
            gpu,
            settings,
            states,
            programs,
            objects,
            scene,
            camera,
            max_texture_units,
            ..
        } = self;
        let states = &*states;
        let scene = scene.resolve(states, camera, settings)?;
        let mut ctx = PassContext {
            gpu,
            programs,
            states,
            scene,
        };
        let mut frame = Frame::new(*max_texture_units);

        ctx.gpu.set_render_target(RenderTarget::Pick);
        ctx.gpu.clear([0.0; 4]);
        ctx.gpu.set_blend(false);
        let mut targets = Vec::new();
        for (key, object) in objects.iter_mut() {
            let pickable = object
                .modes(states)
                .is_some_and(|modes| modes.is_drawable() && modes.pickable);
            if !pickable {
                continue;
            }
            let index = targets.len() as u32 + 1;
            if object.pick_object(&mut ctx, &mut frame, index) == DrawOutcome::Drawn {
                targets.push(key);
            }
        }
        let pixel = ctx.gpu.read_pixel(x, y);
        ctx.gpu.set_render_target(RenderTarget::Canvas);

        let index = decode_pick_color(pixel)?;
        let key = *targets.get(index as usize - 1)?;
        let object = objects.get(key)?;
        log::debug!("Picked object {} at ({}, {})", object.id(), x, y);
        Some(PickResult {
            object: key,
            entity: object.entity(),
        })
    }

    /// Index of the triangle of `key` under `(x, y)`. `None` when the geometry
    /// carries no pick buffers or nothing was hit.
    pub fn pick_triangle(&mut self, key: ObjectKey, x: u32, y: u32) -> Option<u32> {
        self.pick_primitive(key, x, y, PickPrimitive::Triangle)
    }

    pub fn pick_vertex(&mut self, key: ObjectKey, x: u32, y: u32) -> Option<u32> {
        self.pick_primitive(key, x, y, PickPrimitive::Vertex)
    }

    fn pick_primitive(&mut self, key: ObjectKey, x: u32, y: u32, primitive: PickPrimitive) -> Option<u32> {
        if !self.settings.pick_enabled {
            return None;
        }
        self.tick();

        let Self {
            gpu,
            settings,
            states,
            programs,
            objects,
            scene,
            camera,
            max_texture_units,
            ..
        } = self;
        let states = &*states;
        let object = objects.get_mut(key)?;
        let scene = scene.resolve(states, camera, settings)?;
        let mut ctx = PassContext {
            gpu,
            programs,
            states,
            scene,
        };
        let mut frame = Frame::new(*max_texture_units);

        ctx.gpu.set_render_target(RenderTarget::Pick);
        ctx.gpu.clear([0.0; 4]);
        ctx.gpu.set_blend(false);
        let outcome = match primitive {
            PickPrimitive::Triangle => object.pick_triangle(&mut ctx, &mut frame),
            PickPrimitive::Vertex => object.pick_vertex(&mut ctx, &mut frame),
        };
        if outcome != DrawOutcome::Drawn {
            ctx.gpu.set_render_target(RenderTarget::Canvas);
            return None;
        }
        let pixel = ctx.gpu.read_pixel(x, y);
        ctx.gpu.set_render_target(RenderTarget::Canvas);
        decode_pick_color(pixel).map(|index| index - 1)
    }
}

impl<G: Gpu> Drop for Renderer<G> {
    fn drop(&mut self) {
        for (_, mut object) in self.objects.drain() {
            object.destroy(&mut self.gpu, &mut self.programs);
        }
        self.programs.clear(&mut self.gpu);
    }
}

fn is_emphasized(modes: &ModesState, appearance: Appearance) -> bool {
    match appearance {
        Appearance::Ghost => modes.xrayed,
        Appearance::Highlight => modes.highlighted,
        Appearance::Selected => modes.selected,
    }
}

fn draw_normal(
    ctx: &mut PassContext<'_>,
    frame: &mut Frame,
    objects: &mut SlotMap<ObjectKey, RenderObject>,
    entry: &DrawEntry,
    stats: &mut RendererStats,
) {
    let Some(object) = objects.get_mut(entry.object) else {
        return;
    };
    if object.modes(ctx.states).is_some_and(|modes| modes.xrayed) {
        return;
    }
    let outcome = object.draw(ctx, frame);
    if outcome == DrawOutcome::Drawn {
        stats.objects_drawn += 1;
    }
    stats.tally(outcome);
}

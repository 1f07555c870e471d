// renderer/object.rs
use slotmap::new_key_type;

use super::frame::Frame;
use super::gpu::Gpu;
use super::passes::draw::DrawPass;
use super::passes::emphasis::{EdgesPass, FillPass, VerticesPass};
use super::passes::outline::OutlinePass;
use super::passes::pick::{PickMeshPass, PickTrianglePass, PickVertexPass};
use super::passes::shadow::ShadowPass;
use super::passes::{
    ObjectContext, PassArgs, PassKind, PassProgram, PassRenderer, ProgramCache, ProgramHandle,
    SceneContext,
};
use super::state::{
    Appearance, GeometryState, MaterialState, ModesState, StateFactory, StateId, StateRef,
    TransformState, VertexBufsState,
};

new_key_type! {
    pub struct ObjectKey;
}

/// The fragments an object is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStates {
    pub material: StateRef<MaterialState>,
    pub geometry: StateRef<GeometryState>,
    pub transform: StateRef<TransformState>,
    pub modes: StateRef<ModesState>,
    pub vertex_bufs: Option<StateRef<VertexBufsState>>,
}

impl ObjectStates {
    pub fn references(&self, id: StateId) -> bool {
        self.material.id() == id
            || self.geometry.id() == id
            || self.transform.id() == id
            || self.modes.id() == id
            || self.vertex_bufs.is_some_and(|v| v.id() == id)
    }

    /// Whether `id` is a fragment the object cannot be drawn without.
    pub fn requires(&self, id: StateId) -> bool {
        self.references(id) && self.vertex_bufs.map_or(true, |v| v.id() != id)
    }
}

/// Everything a pass invocation needs besides the object itself.
pub struct PassContext<'a> {
    pub gpu: &'a mut dyn Gpu,
    pub programs: &'a mut ProgramCache,
    pub states: &'a StateFactory,
    pub scene: SceneContext<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    /// Nothing to draw for this pass (missing state, buffers or flags).
    Skipped,
    /// The pass program failed to compile.
    Failed,
}

type Stamp = [u64; 7];

struct PassSlot {
    handle: ProgramHandle,
    hash: String,
    stamp: Stamp,
}

/// Compile failure recorded on an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub pass: PassKind,
    pub hash: String,
    pub errors: Vec<String>,
}

/// Renderer-side view of one drawable object. Memoizes one program handle
/// per pass, stamped with the structural generations it was derived from;
/// a stale stamp recomputes the pass hash and swaps the handle only if the
/// hash moved.
pub struct RenderObject {
    id: u32,
    entity: hecs::Entity,
    states: ObjectStates,
    passes: [Option<PassSlot>; PassKind::COUNT],
    failures: [Option<CompileFailure>; PassKind::COUNT],
}

impl RenderObject {
    pub fn new(id: u32, entity: hecs::Entity, states: ObjectStates) -> Self {
        Self {
            id,
            entity,
            states,
            passes: std::array::from_fn(|_| None),
            failures: std::array::from_fn(|_| None),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn entity(&self) -> hecs::Entity {
        self.entity
    }

    pub fn states(&self) -> &ObjectStates {
        &self.states
    }

    /// Swaps fragments. Memoized programs are revalidated on the next use.
    pub fn set_states(&mut self, states: ObjectStates) {
        self.states = states;
        for slot in self.passes.iter_mut().flatten() {
            slot.stamp = [0; 7];
        }
    }

    pub(crate) fn clear_vertex_bufs(&mut self) {
        self.states.vertex_bufs = None;
    }

    /// Compiler output of every pass whose current program failed, empty
    /// when healthy.
    pub fn errors(&self) -> Vec<String> {
        self.failures()
            .flat_map(|failure| failure.errors.iter().cloned())
            .collect()
    }

    /// Current failures in pass order.
    pub fn failures(&self) -> impl Iterator<Item = &CompileFailure> {
        self.failures.iter().flatten()
    }

    pub fn resolve<'s>(&self, states: &'s StateFactory) -> Option<ObjectContext<'s>> {
        let vertex_bufs = match self.states.vertex_bufs {
            Some(r) => Some(states.get(r)?),
            None => None,
        };
        Some(ObjectContext {
            material: states.get(self.states.material)?,
            geometry: states.get(self.states.geometry)?,
            transform: states.get(self.states.transform)?,
            modes: states.get(self.states.modes)?,
            vertex_bufs,
        })
    }

    pub fn modes<'s>(&self, states: &'s StateFactory) -> Option<&'s ModesState> {
        states.get(self.states.modes).map(|m| m.value())
    }

    pub fn program<'p>(&self, programs: &'p ProgramCache, kind: PassKind) -> Option<&'p PassProgram> {
        let slot = self.passes[kind.index()].as_ref()?;
        programs.get(&slot.handle)
    }

    /// Hash of the memoized program for `kind`, if acquired.
    pub fn pass_hash(&self, kind: PassKind) -> Option<&str> {
        self.passes[kind.index()].as_ref().map(|slot| slot.hash.as_str())
    }

    /// Revalidates the draw program. Returns its id when the object can be
    /// drawn at all.
    pub fn prepare(&mut self, ctx: &mut PassContext<'_>) -> Option<u32> {
        let object = self.resolve(ctx.states)?;
        self.ensure::<DrawPass>(ctx, &object);
        self.program(ctx.programs, PassKind::Draw).map(PassProgram::id)
    }

    fn ensure<P: PassRenderer>(&mut self, ctx: &mut PassContext<'_>, object: &ObjectContext<'_>) {
        let stamp = stamp(&ctx.scene, object);
        let scene = ctx.scene;
        let slot = &mut self.passes[P::KIND.index()];

        if let Some(current) = slot {
            if current.stamp == stamp {
                return;
            }
            let hash = P::hash(&scene, object);
            if hash == current.hash {
                current.stamp = stamp;
                return;
            }
            log::debug!(
                "Object {} {} program '{}' -> '{}'",
                self.id,
                P::KIND,
                current.hash,
                hash
            );
            self.failures[P::KIND.index()] = None;
            let handle = ctx
                .programs
                .acquire(ctx.gpu, P::KIND, &hash, || P::source(&scene, object));
            let old = std::mem::replace(
                current,
                PassSlot {
                    handle,
                    hash,
                    stamp,
                },
            );
            ctx.programs.release(ctx.gpu, old.handle);
        } else {
            let hash = P::hash(&scene, object);
            let handle = ctx
                .programs
                .acquire(ctx.gpu, P::KIND, &hash, || P::source(&scene, object));
            *slot = Some(PassSlot {
                handle,
                hash,
                stamp,
            });
        }
    }

    pub(crate) fn run_pass<P: PassRenderer>(
        &mut self,
        ctx: &mut PassContext<'_>,
        frame: &mut Frame,
        args: &PassArgs,
    ) -> DrawOutcome {
        let Some(object) = self.resolve(ctx.states) else {
            log::trace!("Object {} has unresolved states; skipping {}", self.id, P::KIND);
            return DrawOutcome::Skipped;
        };
        if !P::applies(&object, args) {
            return DrawOutcome::Skipped;
        }
        self.ensure::<P>(ctx, &object);

        let Some(slot) = &self.passes[P::KIND.index()] else {
            return DrawOutcome::Skipped;
        };
        let Some(entry) = ctx.programs.get_mut(&slot.handle) else {
            return DrawOutcome::Skipped;
        };
        let id = entry.id();
        if !entry.is_valid() {
            let failure = CompileFailure {
                pass: P::KIND,
                hash: entry.hash().to_string(),
                errors: entry.errors().to_vec(),
            };
            let recorded = &mut self.failures[P::KIND.index()];
            if recorded.as_ref() != Some(&failure) {
                log::warn!(
                    "Object {} not drawn in {} pass: program '{}' failed to compile",
                    self.id,
                    P::KIND,
                    failure.hash
                );
                *recorded = Some(failure);
            }
            return DrawOutcome::Failed;
        }
        self.failures[P::KIND.index()] = None;

        let (Some(program), last) = entry.split_mut() else {
            return DrawOutcome::Failed;
        };
        if frame.last_program != Some(id) {
            program.bind(ctx.gpu);
            last.reset();
            P::bind_program(program, ctx.gpu, frame, &ctx.scene, args);
            frame.last_program = Some(id);
            frame.program_binds += 1;
        }
        P::draw_object(program, last, ctx.gpu, frame, &ctx.scene, &object, args);
        DrawOutcome::Drawn
    }

    pub fn draw(&mut self, ctx: &mut PassContext<'_>, frame: &mut Frame) -> DrawOutcome {
        self.run_pass::<DrawPass>(ctx, frame, &PassArgs::default())
    }

    pub fn draw_emphasis_fill(
        &mut self,
        ctx: &mut PassContext<'_>,
        frame: &mut Frame,
        appearance: Appearance,
    ) -> DrawOutcome {
        self.run_pass::<FillPass>(ctx, frame, &PassArgs::appearance(appearance))
    }

    pub fn draw_emphasis_edges(
        &mut self,
        ctx: &mut PassContext<'_>,
        frame: &mut Frame,
        appearance: Appearance,
    ) -> DrawOutcome {
        self.run_pass::<EdgesPass>(ctx, frame, &PassArgs::appearance(appearance))
    }

    pub fn draw_emphasis_vertices(
        &mut self,
        ctx: &mut PassContext<'_>,
        frame: &mut Frame,
        appearance: Appearance,
    ) -> DrawOutcome {
        self.run_pass::<VerticesPass>(ctx, frame, &PassArgs::appearance(appearance))
    }

    pub fn draw_outline(&mut self, ctx: &mut PassContext<'_>, frame: &mut Frame) -> DrawOutcome {
        self.run_pass::<OutlinePass>(ctx, frame, &PassArgs::default())
    }

    pub fn draw_shadow(
        &mut self,
        ctx: &mut PassContext<'_>,
        frame: &mut Frame,
        light: usize,
    ) -> DrawOutcome {
        self.run_pass::<ShadowPass>(ctx, frame, &PassArgs::light(light))
    }

    pub fn pick_object(
        &mut self,
        ctx: &mut PassContext<'_>,
        frame: &mut Frame,
        pick_index: u32,
    ) -> DrawOutcome {
        self.run_pass::<PickMeshPass>(ctx, frame, &PassArgs::pick(pick_index))
    }

    pub fn pick_triangle(&mut self, ctx: &mut PassContext<'_>, frame: &mut Frame) -> DrawOutcome {
        self.run_pass::<PickTrianglePass>(ctx, frame, &PassArgs::default())
    }

    pub fn pick_vertex(&mut self, ctx: &mut PassContext<'_>, frame: &mut Frame) -> DrawOutcome {
        self.run_pass::<PickVertexPass>(ctx, frame, &PassArgs::default())
    }

    /// Releases every memoized program. Safe to call more than once.
    pub fn destroy(&mut self, gpu: &mut dyn Gpu, programs: &mut ProgramCache) {
        self.failures = std::array::from_fn(|_| None);
        for slot in &mut self.passes {
            if let Some(slot) = slot.take() {
                programs.release(gpu, slot.handle);
            }
        }
    }
}

fn stamp(scene: &SceneContext<'_>, object: &ObjectContext<'_>) -> Stamp {
    let [a, b, c] = scene.stamp();
    let [d, e, f, g] = object.stamp();
    [a, b, c, d, e, f, g]
}

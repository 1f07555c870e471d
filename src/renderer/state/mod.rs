// renderer/state/mod.rs
pub mod clips;
pub mod emphasis;
pub mod geometry;
pub mod handle;
pub mod ids;
pub mod lights;
pub mod material;
pub mod modes;
pub mod transform;

pub use clips::{ClipPlane, ClipsState};
pub use emphasis::{Appearance, EmphasisMaterialState, OutlineMaterialState};
pub use geometry::{GeometryBuffers, GeometryFeatures, GeometryState, VertexBufsState};
pub use handle::{StateId, StateRef};
pub use ids::IdMap;
pub use lights::{
    DirectionalLight, Light, LightRaw, LightSpace, LightsState, PointLight, ShadowSource,
    SpotLight,
};
pub use material::{AlphaMode, LightingModel, MaterialMaps, MaterialState};
pub use modes::ModesState;
pub use transform::{Transform, TransformState};

use std::fmt;
use std::ops::Deref;

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Material,
    EmphasisMaterial,
    OutlineMaterial,
    Modes,
    Lights,
    Clips,
    Geometry,
    Transform,
    VertexBufs,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Implemented by every fragment kind.
pub trait RenderState: Sized {
    const KIND: StateKind;

    /// Structural summary of the fragment. `None` means the fragment has no
    /// structural variants and is identified by its id alone.
    fn feature_hash(&self) -> Option<String> {
        None
    }
}

/// Links a fragment kind to its pool inside [`StateFactory`].
pub trait PooledState: RenderState {
    fn pool(factory: &StateFactory) -> &StatePool<Self>;
    fn pool_mut(factory: &mut StateFactory) -> &mut StatePool<Self>;
}

/// A live fragment: the value plus its identity.
#[derive(Debug, Clone)]
pub struct State<S> {
    id: StateId,
    serial: u64,
    hash: String,
    generation: u64,
    value: S,
}

impl<S> State<S> {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Factory-wide counter value of the last structural change. Never reused,
    /// even when the id is.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn value(&self) -> &S {
        &self.value
    }
}

impl<S> Deref for State<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.value
    }
}

/// Outcome of [`StateFactory::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureChange {
    /// Only values changed; cached programs stay valid.
    Unchanged,
    /// The hash changed; programs keyed by the old hash are stale.
    Rehashed,
}

pub struct StatePool<S> {
    items: FxHashMap<StateId, State<S>>,
}

impl<S> StatePool<S> {
    pub fn new() -> Self {
        Self {
            items: FxHashMap::default(),
        }
    }

    pub fn get(&self, state: StateRef<S>) -> Option<&State<S>> {
        self.items
            .get(&state.id())
            .filter(|entry| entry.serial == state.serial())
    }

    fn get_mut(&mut self, state: StateRef<S>) -> Option<&mut State<S>> {
        self.items
            .get_mut(&state.id())
            .filter(|entry| entry.serial == state.serial())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<S> Default for StatePool<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocates fragments. Performs no GPU calls.
#[derive(Default)]
pub struct StateFactory {
    ids: IdMap,
    generation: u64,
    materials: StatePool<MaterialState>,
    emphasis_materials: StatePool<EmphasisMaterialState>,
    outline_materials: StatePool<OutlineMaterialState>,
    modes: StatePool<ModesState>,
    lights: StatePool<LightsState>,
    clips: StatePool<ClipsState>,
    geometries: StatePool<GeometryState>,
    transforms: StatePool<TransformState>,
    vertex_bufs: StatePool<VertexBufsState>,
}

macro_rules! pooled_state {
    ($ty:ty, $field:ident) => {
        impl PooledState for $ty {
            fn pool(factory: &StateFactory) -> &StatePool<Self> {
                &factory.$field
            }

            fn pool_mut(factory: &mut StateFactory) -> &mut StatePool<Self> {
                &mut factory.$field
            }
        }
    };
}

pooled_state!(MaterialState, materials);
pooled_state!(EmphasisMaterialState, emphasis_materials);
pooled_state!(OutlineMaterialState, outline_materials);
pooled_state!(ModesState, modes);
pooled_state!(LightsState, lights);
pooled_state!(ClipsState, clips);
pooled_state!(GeometryState, geometries);
pooled_state!(TransformState, transforms);
pooled_state!(VertexBufsState, vertex_bufs);

impl StateFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn create<S: PooledState>(&mut self, value: S) -> StateRef<S> {
        let id = StateId(self.ids.allocate());
        let generation = self.next_generation();
        let hash = value.feature_hash().unwrap_or_else(|| id.to_string());
        log::trace!("Created {} state {} (hash '{}')", S::KIND, id, hash);
        S::pool_mut(self).items.insert(
            id,
            State {
                id,
                serial: generation,
                hash,
                generation,
                value,
            },
        );
        StateRef::new(id, generation)
    }

    pub fn get<S: PooledState>(&self, state: StateRef<S>) -> Option<&State<S>> {
        S::pool(self).get(state)
    }

    pub fn contains<S: PooledState>(&self, state: StateRef<S>) -> bool {
        self.get(state).is_some()
    }

    /// Mutates a fragment and recomputes its hash. Returns `None` if the
    /// fragment no longer exists.
    pub fn update<S: PooledState>(
        &mut self,
        state: StateRef<S>,
        mutate: impl FnOnce(&mut S),
    ) -> Option<StructureChange> {
        let entry = S::pool_mut(self).get_mut(state)?;
        mutate(&mut entry.value);
        let new_hash = entry
            .value
            .feature_hash()
            .unwrap_or_else(|| entry.id.to_string());
        if new_hash == entry.hash {
            return Some(StructureChange::Unchanged);
        }

        log::debug!(
            "{} state {} rehashed '{}' -> '{}'",
            S::KIND,
            entry.id,
            entry.hash,
            new_hash
        );
        entry.hash = new_hash;
        let generation = self.next_generation();
        if let Some(entry) = S::pool_mut(self).get_mut(state) {
            entry.generation = generation;
        }
        Some(StructureChange::Rehashed)
    }

    /// Removes the fragment and returns its id to the free pool.
    pub fn destroy<S: PooledState>(&mut self, state: StateRef<S>) -> Option<S> {
        let pool = S::pool_mut(self);
        pool.get(state)?;
        let removed = pool.items.remove(&state.id())?;
        self.ids.release(removed.id.0);
        Some(removed.value)
    }

    pub fn live_count(&self) -> usize {
        self.ids.live_count()
    }
}

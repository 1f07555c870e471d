// renderer/passes/cache.rs
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use super::{BindTrackers, PassKind};
use crate::renderer::gpu::Gpu;
use crate::renderer::program::Program;
use crate::renderer::shader::ShaderSource;
use crate::renderer::state::IdMap;

new_key_type! {
    pub struct ProgramKey;
}

/// A cached program. `program` is `None` when compilation failed; `errors`
/// then holds the compiler output.
pub struct PassProgram {
    id: u32,
    kind: PassKind,
    hash: String,
    use_count: u32,
    program: Option<Program>,
    errors: Vec<String>,
    pub(crate) last: BindTrackers,
}

impl PassProgram {
    /// Numeric id, unique among live programs. Used as a sort key.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    pub(crate) fn split_mut(&mut self) -> (Option<&Program>, &mut BindTrackers) {
        (self.program.as_ref(), &mut self.last)
    }
}

/// Proof of one acquisition. Not `Clone`: releasing consumes it, so a
/// handle can only be released once.
#[derive(Debug, PartialEq, Eq)]
pub struct ProgramHandle {
    key: ProgramKey,
    kind: PassKind,
}

impl ProgramHandle {
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn key(&self) -> ProgramKey {
        self.key
    }
}

/// Reference-counted programs keyed by `(pass kind, hash)`. Failed compiles
/// are cached too, so a broken hash is reported once and then skipped.
pub struct ProgramCache {
    programs: SlotMap<ProgramKey, PassProgram>,
    lookup: [FxHashMap<String, ProgramKey>; PassKind::COUNT],
    ids: IdMap,
    compiles: usize,
}

impl Default for ProgramCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramCache {
    pub fn new() -> Self {
        Self {
            programs: SlotMap::with_key(),
            lookup: std::array::from_fn(|_| FxHashMap::default()),
            ids: IdMap::new(),
            compiles: 0,
        }
    }

    /// Returns a handle to the program cached under `(kind, hash)`, compiling
    /// `source()` on a miss.
    pub fn acquire(
        &mut self,
        gpu: &mut dyn Gpu,
        kind: PassKind,
        hash: &str,
        source: impl FnOnce() -> ShaderSource,
    ) -> ProgramHandle {
        if let Some(&key) = self.lookup[kind.index()].get(hash) {
            if let Some(entry) = self.programs.get_mut(key) {
                entry.use_count += 1;
                return ProgramHandle { key, kind };
            }
        }

        let source = source();
        self.compiles += 1;
        let (program, errors) = match Program::compile(gpu, &source) {
            Ok(program) => {
                log::debug!("Compiled {} program '{}'", kind, hash);
                (Some(program), Vec::new())
            }
            Err(errors) => {
                log::error!(
                    "Failed to compile {} program '{}':\n{}",
                    kind,
                    hash,
                    errors.join("\n")
                );
                (None, errors)
            }
        };

        let key = self.programs.insert(PassProgram {
            id: self.ids.allocate(),
            kind,
            hash: hash.to_string(),
            use_count: 1,
            program,
            errors,
            last: BindTrackers::default(),
        });
        self.lookup[kind.index()].insert(hash.to_string(), key);
        ProgramHandle { key, kind }
    }

    /// Drops one use of the program; the GPU program is deleted with the last.
    pub fn release(&mut self, gpu: &mut dyn Gpu, handle: ProgramHandle) {
        let Some(entry) = self.programs.get_mut(handle.key) else {
            log::warn!("Released unknown {} program", handle.kind);
            return;
        };
        entry.use_count = entry.use_count.saturating_sub(1);
        if entry.use_count > 0 {
            return;
        }

        if let Some(entry) = self.programs.remove(handle.key) {
            self.lookup[handle.kind.index()].remove(&entry.hash);
            self.ids.release(entry.id);
            log::debug!("Destroyed {} program '{}'", entry.kind, entry.hash);
            if let Some(program) = entry.program {
                program.destroy(gpu);
            }
        }
    }

    pub fn get(&self, handle: &ProgramHandle) -> Option<&PassProgram> {
        self.programs.get(handle.key)
    }

    pub(crate) fn get_mut(&mut self, handle: &ProgramHandle) -> Option<&mut PassProgram> {
        self.programs.get_mut(handle.key)
    }

    pub fn find(&self, kind: PassKind, hash: &str) -> Option<&PassProgram> {
        let key = self.lookup[kind.index()].get(hash)?;
        self.programs.get(*key)
    }

    pub fn use_count(&self, kind: PassKind, hash: &str) -> Option<u32> {
        self.find(kind, hash).map(PassProgram::use_count)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn len_of(&self, kind: PassKind) -> usize {
        self.lookup[kind.index()].len()
    }

    /// Number of compilations attempted since creation, failed ones included.
    pub fn compile_count(&self) -> usize {
        self.compiles
    }

    /// Deletes every program regardless of use counts. Outstanding handles
    /// become inert.
    pub fn clear(&mut self, gpu: &mut dyn Gpu) {
        for (_, entry) in self.programs.drain() {
            if let Some(program) = entry.program {
                program.destroy(gpu);
            }
        }
        for lookup in &mut self.lookup {
            lookup.clear();
        }
        self.ids = IdMap::new();
    }
}

// renderer/state/ids.rs
use rustc_hash::FxHashSet;

/// Monotonic id allocator backed by a free list.
///
/// Released ids are handed out again (most recently released first), so two
/// live holders never share an id but a destroyed holder's id is reused.
#[derive(Debug, Default)]
pub struct IdMap {
    next: u32,
    free: Vec<u32>,
    live: FxHashSet<u32>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> u32 {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.next += 1;
                self.next
            }
        };
        self.live.insert(id);
        id
    }

    /// Returns `false` when `id` was not live.
    pub fn release(&mut self, id: u32) -> bool {
        if !self.live.remove(&id) {
            log::warn!("Ignoring release of id {} which is not live", id);
            return false;
        }
        self.free.push(id);
        true
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

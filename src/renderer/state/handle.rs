// renderer/state/handle.rs
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Process-unique id of a live state fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed, non-owning reference to a fragment stored in the
/// [`StateFactory`](super::StateFactory).
///
/// Ids are reused after a fragment is destroyed; the serial is not, so a
/// stale reference never resolves to the fragment that took over its id.
pub struct StateRef<S> {
    id: StateId,
    serial: u64,
    _marker: PhantomData<fn() -> S>,
}

// Manual impls so that S does not need to implement these traits itself.
impl<S> fmt::Debug for StateRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateRef")
            .field(&self.id)
            .field(&self.serial)
            .finish()
    }
}

impl<S> PartialEq for StateRef<S> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.serial == other.serial
    }
}

impl<S> Eq for StateRef<S> {}

impl<S> Hash for StateRef<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.serial.hash(state);
    }
}

impl<S> Clone for StateRef<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for StateRef<S> {}

impl<S> StateRef<S> {
    pub(crate) fn new(id: StateId, serial: u64) -> Self {
        Self {
            id,
            serial,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ref_is_copy() {
        let r1: StateRef<String> = StateRef::new(StateId(5), 1);
        let r2 = r1;
        let r3 = r1;
        assert_eq!(r1.id(), r2.id());
        assert_eq!(r1.id(), r3.id());
    }

    #[test]
    fn refs_with_reused_id_are_distinct() {
        let old: StateRef<String> = StateRef::new(StateId(5), 1);
        let new: StateRef<String> = StateRef::new(StateId(5), 9);
        assert_eq!(old.id(), new.id());
        assert_ne!(old, new);
    }
}

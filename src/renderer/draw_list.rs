// renderer/draw_list.rs
use std::ops::Range;

use super::object::ObjectKey;
use super::state::StateId;

/// Sort key. Field order is precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawKey {
    pub layer: i32,
    pub program: u32,
    pub material: StateId,
    /// Zero when the object has no shared vertex buffers.
    pub vertex_bufs: u32,
    pub geometry: StateId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawEntry {
    pub key: DrawKey,
    pub object: ObjectKey,
    pub transparent: bool,
}

/// Sorted draw order, split into an opaque range followed by a transparent
/// range. Only re-sorted when some key changed.
#[derive(Default)]
pub struct DrawList {
    entries: Vec<DrawEntry>,
    snapshot: Vec<DrawEntry>,
    opaque_range: Range<usize>,
    transparent_range: Range<usize>,
    sorts: usize,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the list contents. `entries` arrive in object registration
    /// order; the sort is stable, so ties keep that order. Returns whether a
    /// re-sort happened.
    pub fn update(&mut self, entries: Vec<DrawEntry>, split_transparent: bool) -> bool {
        if entries == self.snapshot {
            return false;
        }

        let mut opaque = Vec::with_capacity(entries.len());
        let mut transparent = Vec::new();
        for entry in &entries {
            if split_transparent && entry.transparent {
                transparent.push(*entry);
            } else {
                opaque.push(*entry);
            }
        }
        opaque.sort_by(|a, b| a.key.cmp(&b.key));
        transparent.sort_by(|a, b| a.key.cmp(&b.key));

        self.entries.clear();
        self.opaque_range = append(&mut self.entries, opaque);
        self.transparent_range = append(&mut self.entries, transparent);
        self.snapshot = entries;
        self.sorts += 1;
        log::trace!(
            "Sorted draw list: {} opaque, {} transparent",
            self.opaque_range.len(),
            self.transparent_range.len()
        );
        true
    }

    /// Forces the next [`update`](Self::update) to re-sort.
    pub fn invalidate(&mut self) {
        self.snapshot.clear();
    }

    pub fn all(&self) -> &[DrawEntry] {
        &self.entries
    }

    pub fn opaque(&self) -> &[DrawEntry] {
        &self.entries[self.opaque_range.clone()]
    }

    pub fn transparent(&self) -> &[DrawEntry] {
        &self.entries[self.transparent_range.clone()]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sorts performed so far.
    pub fn sort_count(&self) -> usize {
        self.sorts
    }
}

fn append(dest: &mut Vec<DrawEntry>, src: Vec<DrawEntry>) -> Range<usize> {
    let start = dest.len();
    dest.extend(src);
    start..dest.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn key(layer: i32, program: u32, material: u32, geometry: u32) -> DrawKey {
        DrawKey {
            layer,
            program,
            material: StateId(material),
            vertex_bufs: 0,
            geometry: StateId(geometry),
        }
    }

    fn entries(keys: &[DrawKey]) -> (Vec<DrawEntry>, Vec<ObjectKey>) {
        let mut objects: SlotMap<ObjectKey, ()> = SlotMap::with_key();
        let ids: Vec<_> = keys.iter().map(|_| objects.insert(())).collect();
        let list = keys
            .iter()
            .zip(&ids)
            .map(|(key, object)| DrawEntry {
                key: *key,
                object: *object,
                transparent: false,
            })
            .collect();
        (list, ids)
    }

    #[test]
    fn layer_precedes_program_and_geometry_breaks_ties() {
        let (list, ids) = entries(&[
            key(1, 1, 1, 1),
            key(0, 2, 1, 9),
            key(0, 2, 1, 3),
            key(0, 1, 5, 1),
        ]);
        let mut draw_list = DrawList::new();
        draw_list.update(list, true);

        let order: Vec<_> = draw_list.all().iter().map(|e| e.object).collect();
        assert_eq!(order, vec![ids[3], ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn equal_keys_keep_registration_order() {
        let (list, ids) = entries(&[key(0, 1, 1, 1), key(0, 1, 1, 1), key(0, 1, 1, 1)]);
        let mut draw_list = DrawList::new();
        draw_list.update(list, true);

        let order: Vec<_> = draw_list.all().iter().map(|e| e.object).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn transparent_entries_follow_opaque_ones() {
        let (mut list, ids) = entries(&[key(0, 1, 1, 1), key(0, 2, 2, 2)]);
        list[0].transparent = true;
        let mut draw_list = DrawList::new();
        draw_list.update(list, true);

        assert_eq!(draw_list.opaque().len(), 1);
        assert_eq!(draw_list.opaque()[0].object, ids[1]);
        assert_eq!(draw_list.transparent()[0].object, ids[0]);
    }

    #[test]
    fn unchanged_entries_skip_resort() {
        let (list, _) = entries(&[key(0, 1, 1, 1), key(0, 2, 2, 2)]);
        let mut draw_list = DrawList::new();
        assert!(draw_list.update(list.clone(), true));
        assert!(!draw_list.update(list.clone(), true));
        assert_eq!(draw_list.sort_count(), 1);

        draw_list.invalidate();
        assert!(draw_list.update(list, true));
    }
}

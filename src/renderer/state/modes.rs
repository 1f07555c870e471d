// renderer/state/modes.rs
use super::{RenderState, StateKind};
use crate::renderer::gpu::FrontFace;

/// Per-object render modes and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ModesState {
    pub visible: bool,
    pub culled: bool,
    pub pickable: bool,
    pub clippable: bool,
    pub collidable: bool,
    pub casts_shadow: bool,
    pub receives_shadow: bool,
    pub xrayed: bool,
    pub highlighted: bool,
    pub selected: bool,
    pub outlined: bool,
    pub layer: i32,
    pub colorize: [f32; 4],
    pub backfaces: bool,
    pub frontface: FrontFace,
}

impl Default for ModesState {
    fn default() -> Self {
        Self {
            visible: true,
            culled: false,
            pickable: true,
            clippable: true,
            collidable: true,
            casts_shadow: true,
            receives_shadow: true,
            xrayed: false,
            highlighted: false,
            selected: false,
            outlined: false,
            layer: 0,
            colorize: [1.0, 1.0, 1.0, 1.0],
            backfaces: false,
            frontface: FrontFace::Ccw,
        }
    }
}

impl ModesState {
    /// Whether the object takes part in any pass this frame.
    pub fn is_drawable(&self) -> bool {
        self.visible && !self.culled
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }
}

impl RenderState for ModesState {
    const KIND: StateKind = StateKind::Modes;

    // Only flags that select shader code; GL state flags (backfaces,
    // frontface) and emphasis toggles are applied per draw.
    fn feature_hash(&self) -> Option<String> {
        Some(u8::from(self.receives_shadow).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_flags_are_not_structural() {
        let base = ModesState::default();
        let mut flagged = base.clone();
        flagged.selected = true;
        flagged.highlighted = true;
        flagged.colorize = [0.5, 0.5, 0.5, 1.0];
        flagged.backfaces = true;

        assert_eq!(base.feature_hash(), flagged.feature_hash());
    }

    #[test]
    fn only_shadow_reception_is_structural() {
        let base = ModesState::default();
        let mut unclipped = base.clone();
        unclipped.clippable = false;
        let mut unshadowed = base.clone();
        unshadowed.receives_shadow = !base.receives_shadow;

        assert_eq!(base.feature_hash(), unclipped.feature_hash());
        assert_ne!(base.feature_hash(), unshadowed.feature_hash());
    }
}

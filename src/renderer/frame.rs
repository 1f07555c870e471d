// renderer/frame.rs
use super::gpu::{FrontFace, Gpu};

/// Short-lived record of what is currently bound on the GPU. Reset at the
/// start of every pass; objects consult it to skip redundant state changes.
#[derive(Debug, Clone)]
pub struct Frame {
    max_texture_units: u32,
    texture_unit: u32,
    pub last_program: Option<u32>,
    line_width: Option<f32>,
    frontface: Option<FrontFace>,
    backfaces: Option<bool>,
    pub draw_elements: u32,
    pub draw_arrays: u32,
    pub program_binds: u32,
    pub texture_binds: u32,
}

impl Frame {
    pub fn new(max_texture_units: u32) -> Self {
        Self {
            max_texture_units: max_texture_units.max(1),
            texture_unit: 0,
            last_program: None,
            line_width: None,
            frontface: None,
            backfaces: None,
            draw_elements: 0,
            draw_arrays: 0,
            program_binds: 0,
            texture_binds: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.max_texture_units);
    }

    /// Hands out texture units round-robin. Wraps to 0 after the last unit the
    /// device reports.
    pub fn next_texture_unit(&mut self) -> u32 {
        let unit = self.texture_unit;
        self.texture_unit = (self.texture_unit + 1) % self.max_texture_units;
        self.texture_binds += 1;
        unit
    }

    pub fn draw_calls(&self) -> u32 {
        self.draw_elements + self.draw_arrays
    }

    pub fn set_line_width(&mut self, gpu: &mut dyn Gpu, width: f32) {
        if self.line_width != Some(width) {
            gpu.set_line_width(width);
            self.line_width = Some(width);
        }
    }

    pub fn set_front_face(&mut self, gpu: &mut dyn Gpu, face: FrontFace) {
        if self.frontface != Some(face) {
            gpu.set_front_face(face);
            self.frontface = Some(face);
        }
    }

    /// `backfaces == true` disables culling.
    pub fn set_backfaces(&mut self, gpu: &mut dyn Gpu, backfaces: bool) {
        if self.backfaces != Some(backfaces) {
            gpu.set_cull_face(!backfaces);
            self.backfaces = Some(backfaces);
        }
    }
}

/// Colour written by the object pick pass for 1-based `index`.
pub fn encode_pick_index(index: u32) -> [f32; 4] {
    let [r, g, b, a] = index.to_le_bytes();
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}

/// Inverse of [`encode_pick_index`] on a read-back pixel. Zero is background.
pub fn decode_pick_color(rgba: [u8; 4]) -> Option<u32> {
    match u32::from_le_bytes(rgba) {
        0 => None,
        index => Some(index),
    }
}

//! Audio-reactive geometry drawn on top of the warped image.
//!
//! Overlays only build vertex batches; the pipeline hands them to the
//! backend. Coordinates are clip space with y up.

pub mod border;
pub mod darken;
pub mod motion;
pub mod shape;
pub mod wave;
pub mod waveform;

pub use border::Border;
pub use darken::DarkenCenter;
pub use motion::MotionVectors;
pub use shape::CustomShape;
pub use wave::CustomWave;
pub use waveform::Waveform;

use crate::render::TextureId;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl OverlayVertex {
    pub fn new(x: f32, y: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            color,
            uv: [0.0, 0.0],
        }
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.uv = [u, v];
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    TriangleFan,
    LineStrip,
    LineLoop,
    Lines,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    Alpha,
    Additive,
}

impl Blend {
    pub fn from_flag(additive: f64) -> Self {
        if additive > 0.0 {
            Self::Additive
        } else {
            Self::Alpha
        }
    }
}

/// Vertices sharing one primitive type and blend state.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatch {
    pub primitive: Primitive,
    pub blend: Blend,
    /// Lines and points are drawn with a wider footprint.
    pub thick: bool,
    pub texture: Option<TextureId>,
    pub vertices: Vec<OverlayVertex>,
}

/// Reusable list of batches. Cleared every frame without dropping the
/// vertex buffers, so steady-state drawing does not allocate.
#[derive(Debug, Default)]
pub struct BatchList {
    batches: Vec<DrawBatch>,
    len: usize,
}

impl BatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn push(&mut self, primitive: Primitive, blend: Blend) -> &mut DrawBatch {
        if self.len == self.batches.len() {
            self.batches.push(DrawBatch {
                primitive,
                blend,
                thick: false,
                texture: None,
                vertices: Vec::new(),
            });
        }
        let batch = &mut self.batches[self.len];
        batch.primitive = primitive;
        batch.blend = blend;
        batch.thick = false;
        batch.texture = None;
        batch.vertices.clear();
        self.len += 1;
        batch
    }

    /// Drops the most recent batch if it ended up empty.
    pub fn discard_empty_tail(&mut self) {
        if self.len > 0 && self.batches[self.len - 1].vertices.is_empty() {
            self.len -= 1;
        }
    }

    pub fn as_slice(&self) -> &[DrawBatch] {
        &self.batches[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn vertex_count(&self) -> usize {
        self.as_slice().iter().map(|batch| batch.vertices.len()).sum()
    }
}

/// Maps [0, 1] preset coordinates (y down) to clip space.
pub(crate) fn to_clip(x: f32, y: f32) -> (f32, f32) {
    (x * 2.0 - 1.0, -(y * 2.0 - 1.0))
}

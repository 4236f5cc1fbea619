use super::{to_clip, BatchList, Blend, DrawBatch, OverlayVertex, Primitive};

const HALF_SIZE: f32 = 0.05;
const CENTER_ALPHA: f32 = 3.0 / 32.0;

/// Small dark diamond over the screen centre, hiding the point every zoom
/// converges on. Drawn only when `darken_center` is positive.
#[derive(Debug, Default)]
pub struct DarkenCenter {
    batches: BatchList,
}

impl DarkenCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, aspect_y: f32) -> &[DrawBatch] {
        self.batches.clear();
        let batch = self.batches.push(Primitive::TriangleFan, Blend::Alpha);
        let rim = [0.0, 0.0, 0.0, 0.0];
        let half_x = HALF_SIZE * aspect_y;
        for (x, y, color) in [
            (0.5, 0.5, [0.0, 0.0, 0.0, CENTER_ALPHA]),
            (0.5 - half_x, 0.5, rim),
            (0.5, 0.5 - HALF_SIZE, rim),
            (0.5 + half_x, 0.5, rim),
            (0.5, 0.5 + HALF_SIZE, rim),
            (0.5 - half_x, 0.5, rim),
        ] {
            let (px, py) = to_clip(x, y);
            batch.vertices.push(OverlayVertex::new(px, py, color));
        }
        self.batches.as_slice()
    }
}

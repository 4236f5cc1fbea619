use super::{to_clip, BatchList, Blend, DrawBatch, OverlayVertex, Primitive};
use crate::expr::{FrameVar, PerFrameEvaluator};

/// Grid of short lines visualising the previous frame's motion.
///
/// Each line is emitted as two identical vertices whose `uv` addresses the
/// motion attachment; the backend displaces the second vertex by the
/// sampled motion scaled with `mv_l`.
#[derive(Debug, Default)]
pub struct MotionVectors {
    batches: BatchList,
}

impl MotionVectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, frame: &PerFrameEvaluator) -> &[DrawBatch] {
        self.batches.clear();

        let alpha = frame.value(FrameVar::MvA);
        let grid_x = frame.value(FrameVar::MvX);
        let grid_y = frame.value(FrameVar::MvY);
        let (count_x, count_y) = (grid_x.floor() as u32, grid_y.floor() as u32);
        if alpha <= 0.0 || count_x == 0 || count_y == 0 {
            return self.batches.as_slice();
        }

        let color = [
            frame.value(FrameVar::MvR),
            frame.value(FrameVar::MvG),
            frame.value(FrameVar::MvB),
            alpha,
        ];
        let frac_x = grid_x - count_x as f32;
        let frac_y = grid_y - count_y as f32;
        let shift_x = frame.get(FrameVar::MvDx) as f32;
        let shift_y = frame.get(FrameVar::MvDy) as f32;

        let batch = self.batches.push(Primitive::Lines, Blend::Alpha);
        for y in 0..count_y {
            let fy = (y as f32 + 0.25) / (count_y as f32 + frac_y + 0.25 - 1.0) - shift_y;
            if !(0.0001..0.9999).contains(&fy) {
                continue;
            }
            for x in 0..count_x {
                let fx = (x as f32 + 0.25) / (count_x as f32 + frac_x + 0.25 - 1.0) + shift_x;
                if !(0.0001..0.9999).contains(&fx) {
                    continue;
                }
                let (px, py) = to_clip(fx, fy);
                let vertex = OverlayVertex::new(px, py, color).with_uv(fx, fy);
                batch.vertices.extend([vertex, vertex]);
            }
        }
        self.batches.discard_empty_tail();
        self.batches.as_slice()
    }

    /// Line length multiplier for the current frame.
    pub fn length(frame: &PerFrameEvaluator) -> f32 {
        frame.value(FrameVar::MvL)
    }
}

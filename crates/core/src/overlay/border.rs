use super::{to_clip, BatchList, Blend, DrawBatch, OverlayVertex, Primitive};
use crate::expr::{FrameVar, PerFrameEvaluator};

/// Outer and inner frame around the screen edge.
#[derive(Debug, Default)]
pub struct Border {
    batches: BatchList,
}

impl Border {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(&mut self, frame: &PerFrameEvaluator) -> &[DrawBatch] {
        self.batches.clear();

        let outer_size = frame.value(FrameVar::ObSize);
        let inner_size = frame.value(FrameVar::IbSize);
        let rings = [
            (
                0.0,
                outer_size,
                [FrameVar::ObR, FrameVar::ObG, FrameVar::ObB, FrameVar::ObA],
            ),
            (
                outer_size,
                inner_size,
                [FrameVar::IbR, FrameVar::IbG, FrameVar::IbB, FrameVar::IbA],
            ),
        ];

        for (offset, size, vars) in rings {
            let color = vars.map(|var| frame.value(var));
            if size <= 0.0 || color[3] <= 0.0 {
                continue;
            }
            let batch = self.batches.push(Primitive::Triangles, Blend::Alpha);
            let (near, far) = (offset, 1.0 - offset);
            for (x0, y0, x1, y1) in [
                (near, near, far, near + size),
                (near, far - size, far, far),
                (near, near + size, near + size, far - size),
                (far - size, near + size, far, far - size),
            ] {
                let (ax, ay) = to_clip(x0, y0);
                let (bx, by) = to_clip(x1, y1);
                for (x, y) in [(ax, ay), (bx, ay), (bx, by), (bx, by), (ax, by), (ax, ay)] {
                    batch.vertices.push(OverlayVertex::new(x, y, color));
                }
            }
        }
        self.batches.as_slice()
    }
}

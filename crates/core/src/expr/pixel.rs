use super::compiler::CompiledProgram;
use super::context::ExprContext;
use super::frame::PerFrameEvaluator;
use super::vars::{FrameVar, PixelVar};
use crate::{mesh::WarpMesh, state::PresetState, LoadError};

const PER_PIXEL_SEED: u64 = 0x5eed_91c3;

/// Per-frame outputs the per-pixel program may override, paired with their
/// per-pixel slot.
const WARP_OUTPUTS: [(FrameVar, PixelVar); 10] = [
    (FrameVar::Zoom, PixelVar::Zoom),
    (FrameVar::ZoomExp, PixelVar::ZoomExp),
    (FrameVar::Rot, PixelVar::Rot),
    (FrameVar::Warp, PixelVar::Warp),
    (FrameVar::Cx, PixelVar::Cx),
    (FrameVar::Cy, PixelVar::Cy),
    (FrameVar::Dx, PixelVar::Dx),
    (FrameVar::Dy, PixelVar::Dy),
    (FrameVar::Sx, PixelVar::Sx),
    (FrameVar::Sy, PixelVar::Sy),
];

/// Warp parameters of one mesh vertex, consumed by the warp pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpParams {
    pub zoom: f32,
    pub zoom_exp: f32,
    pub rot: f32,
    pub warp: f32,
    pub cx: f32,
    pub cy: f32,
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
}

impl Default for WarpParams {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            zoom_exp: 1.0,
            rot: 0.0,
            warp: 0.0,
            cx: 0.5,
            cy: 0.5,
            dx: 0.0,
            dy: 0.0,
            sx: 1.0,
            sy: 1.0,
        }
    }
}

impl WarpParams {
    fn from_values(values: [f64; 10]) -> Self {
        let [zoom, zoom_exp, rot, warp, cx, cy, dx, dy, sx, sy] = values.map(|v| v as f32);
        Self {
            zoom,
            zoom_exp,
            rot,
            warp,
            cx,
            cy,
            dx,
            dy,
            sx,
            sy,
        }
    }
}

/// The preset's per-pixel program, evaluated once per warp-mesh vertex.
#[derive(Debug)]
pub struct PerPixelEvaluator {
    context: ExprContext,
    program: CompiledProgram,
}

impl PerPixelEvaluator {
    pub fn load(code: &str) -> Result<Self, LoadError> {
        let mut context = ExprContext::new(PixelVar::TABLE, PER_PIXEL_SEED);
        let program = context
            .compile(code)
            .map_err(|source| LoadError::Expression {
                program: "per-pixel",
                source,
            })?;
        tracing::debug!(ops = program.ops().len(), "compiled per-pixel code");
        Ok(Self { context, program })
    }

    pub fn has_code(&self) -> bool {
        !self.program.is_empty()
    }

    /// Fills `out` with one [`WarpParams`] per vertex of `mesh`. Without
    /// per-pixel code every vertex takes the per-frame values.
    pub fn evaluate(
        &mut self,
        state: &mut PresetState,
        frame: &PerFrameEvaluator,
        mesh: &WarpMesh,
        out: &mut Vec<WarpParams>,
    ) {
        let frame_values = WARP_OUTPUTS.map(|(var, _)| frame.get(var));
        out.resize(mesh.vertices().len(), WarpParams::default());

        if !self.has_code() {
            out.fill(WarpParams::from_values(frame_values));
            return;
        }

        self.context
            .bind_common_inputs(state, (mesh.width(), mesh.height()));
        self.context.set_q(&state.q);

        for (vertex, params) in mesh.vertices().iter().zip(out.iter_mut()) {
            self.context.set(PixelVar::X.index(), f64::from(vertex.u));
            self.context.set(PixelVar::Y.index(), f64::from(vertex.v));
            self.context.set(PixelVar::Rad.index(), f64::from(vertex.radius));
            self.context.set(PixelVar::Ang.index(), f64::from(vertex.angle));
            for ((_, var), value) in WARP_OUTPUTS.iter().zip(frame_values) {
                self.context.set(var.index(), value);
            }

            self.context.execute(&self.program, &mut state.globals);

            *params = WarpParams::from_values(WARP_OUTPUTS.map(|(_, var)| self.context.get(var.index())));
        }
    }
}

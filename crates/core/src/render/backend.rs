use serde::Serialize;

use crate::config::AttachmentFormat;
use crate::mesh::WarpMesh;
use crate::overlay::DrawBatch;
use crate::shader::ShaderSlot;
use crate::state::Q_COUNT;
use crate::{GpuError, ShaderError};

/// Backend name of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextureId(pub u32);

/// Backend name of a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProgramId(pub u32);

/// Color and motion-vector attachments of one offscreen buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSet {
    pub color: TextureId,
    pub motion: TextureId,
}

/// Values exposed to preset shaders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderUniforms {
    pub time: f32,
    pub fps: f32,
    pub frame: f32,
    pub progress: f32,
    pub bass: f32,
    pub mid: f32,
    pub treb: f32,
    pub bass_att: f32,
    pub mid_att: f32,
    pub treb_att: f32,
    pub vol: f32,
    /// aspect x, aspect y, 1/aspect x, 1/aspect y.
    pub aspect: [f32; 4],
    /// width, height, 1/width, 1/height.
    pub texsize: [f32; 4],
    pub q: [f32; Q_COUNT],
    pub decay: f32,
    pub gamma: f32,
    pub echo_zoom: f32,
    pub echo_alpha: f32,
    pub echo_orient: f32,
    pub darken: bool,
    pub brighten: bool,
    pub invert: bool,
    pub solarize: bool,
    /// (min, max) per blur level.
    pub blur_ranges: [[f32; 2]; 3],
    pub rand_frame: [f32; 4],
    pub rand_preset: [f32; 4],
}

/// One unit of GPU work. Passes borrow their geometry from the pipeline for
/// the duration of the call.
#[derive(Debug)]
pub enum Pass<'a> {
    BeginFrame {
        frame: u64,
    },
    /// Line field sampled from `source`'s motion data, drawn into `target`.
    MotionVectors {
        target: TextureId,
        length: f32,
        batches: &'a [DrawBatch],
    },
    BindTargets {
        read: BufferSet,
        draw: BufferSet,
    },
    /// Enables or disables writes to the draw target's motion attachment.
    MaskMotion(bool),
    Clear {
        color: [f32; 4],
    },
    Warp {
        source: TextureId,
        program: Option<ProgramId>,
        mesh: &'a WarpMesh,
        uvs: &'a [[f32; 2]],
        uniforms: &'a ShaderUniforms,
    },
    UpdateBlur {
        source: TextureId,
        targets: &'a [TextureId],
        ranges: [[f32; 2]; 3],
        edge_darken: f32,
    },
    Shape {
        program: Option<ProgramId>,
        batches: &'a [DrawBatch],
    },
    CustomWave {
        program: Option<ProgramId>,
        batches: &'a [DrawBatch],
    },
    Waveform {
        batches: &'a [DrawBatch],
    },
    Darken {
        batches: &'a [DrawBatch],
    },
    Border {
        batches: &'a [DrawBatch],
    },
    Composite {
        source: TextureId,
        target: TextureId,
        program: Option<ProgramId>,
        mesh: &'a WarpMesh,
        uniforms: &'a ShaderUniforms,
    },
    /// Copies `source` to the backend's default surface.
    Present {
        source: TextureId,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    BeginFrame,
    MotionVectors,
    BindTargets,
    MaskMotion,
    Clear,
    Warp,
    UpdateBlur,
    Shape,
    CustomWave,
    Waveform,
    Darken,
    Border,
    Composite,
    Present,
}

impl Pass<'_> {
    pub fn kind(&self) -> PassKind {
        match self {
            Self::BeginFrame { .. } => PassKind::BeginFrame,
            Self::MotionVectors { .. } => PassKind::MotionVectors,
            Self::BindTargets { .. } => PassKind::BindTargets,
            Self::MaskMotion(_) => PassKind::MaskMotion,
            Self::Clear { .. } => PassKind::Clear,
            Self::Warp { .. } => PassKind::Warp,
            Self::UpdateBlur { .. } => PassKind::UpdateBlur,
            Self::Shape { .. } => PassKind::Shape,
            Self::CustomWave { .. } => PassKind::CustomWave,
            Self::Waveform { .. } => PassKind::Waveform,
            Self::Darken { .. } => PassKind::Darken,
            Self::Border { .. } => PassKind::Border,
            Self::Composite { .. } => PassKind::Composite,
            Self::Present { .. } => PassKind::Present,
        }
    }
}

/// The GPU as the pipeline sees it. Everything the pipeline draws goes
/// through [`RenderBackend::submit`] in issue order.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    fn create_texture(
        &mut self,
        format: AttachmentFormat,
        width: u32,
        height: u32,
    ) -> Result<TextureId, GpuError>;

    fn resize_texture(&mut self, id: TextureId, width: u32, height: u32) -> Result<(), GpuError>;

    fn delete_texture(&mut self, id: TextureId);

    fn compile_program(&mut self, slot: ShaderSlot, text: &str) -> Result<ProgramId, ShaderError>;

    fn delete_program(&mut self, id: ProgramId);

    fn submit(&mut self, pass: Pass<'_>) -> Result<(), GpuError>;
}

//! Core library for the Warpdrop preset renderer.
//!
//! A preset is compiled once from its parsed description and then driven one
//! frame at a time: per-frame and per-pixel formulas run against the audio
//! snapshot, the previous frame is warped through a procedural mesh,
//! overlays are drawn on top and a composite shader produces the output.
//! All GPU work goes through the [`RenderBackend`] trait, so the same
//! pipeline runs on a real context or on the headless [`RecordingBackend`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod expr;
pub mod mesh;
pub mod overlay;
pub mod preset;
pub mod render;
pub mod shader;
pub mod state;

pub use analysis::FeatureExtractor;
pub use audio::{Channel, FrameAudioData};
pub use config::{AttachmentFormat, CompatConfig, EngineConfig, MeshConfig};
pub use error::{ExprError, GpuError, LoadError, RenderError, Result, ShaderError};
pub use expr::{CompiledProgram, ExprContext, PerFrameEvaluator, PerPixelEvaluator};
pub use mesh::{MeshCache, WarpMesh};
pub use preset::{PresetDescription, ShapeDescription, WaveDescription};
pub use render::{
    FramePipeline, FrameStage, FrameTrace, Pass, PassKind, Preset, RecordingBackend,
    RenderBackend,
};
pub use shader::{ShaderOutcome, ShaderSlot, ShaderSource};
pub use state::{NamedTextures, PresetState, RenderContext, TextureHandle};

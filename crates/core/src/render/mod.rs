//! Frame composition: the backend seam, offscreen buffers and the pass
//! sequence that turns one audio snapshot into one frame.

pub mod backend;
pub mod blur;
pub mod framebuffer;
pub mod headless;
pub mod pipeline;
pub mod warp;

pub use backend::{BufferSet, Pass, PassKind, ProgramId, RenderBackend, ShaderUniforms, TextureId};
pub use blur::BlurTextures;
pub use framebuffer::FramebufferPair;
pub use headless::{RecordingBackend, TextureRecord};
pub use pipeline::{FramePipeline, FrameStage, FrameTrace, Preset, ShaderSelection};
pub use warp::{warped_uvs, WarpFrame};

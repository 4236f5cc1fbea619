//! World state shared by every program and pass of one loaded preset.

mod textures;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::audio::FrameAudioData;
use crate::expr::memory::MemoryBank;

pub use textures::{TextureEntry, TextureHandle, TextureRegistry};

/// Number of `reg00`..`reg99` registers.
pub const REGISTER_COUNT: usize = 100;
/// Number of `q1`..`q32` channels.
pub const Q_COUNT: usize = 32;

/// Registers and `gmegabuf` memory, shared by all programs of a preset.
#[derive(Debug, Clone)]
pub struct GlobalBank {
    pub registers: [f64; REGISTER_COUNT],
    pub memory: MemoryBank,
}

impl Default for GlobalBank {
    fn default() -> Self {
        Self {
            registers: [0.0; REGISTER_COUNT],
            memory: MemoryBank::new(),
        }
    }
}

/// Size information for a texture the host makes available to shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
}

/// Host-side lookup for named textures (`sampler_<name>` in shader text).
pub trait TextureCatalog: fmt::Debug {
    fn lookup(&self, name: &str) -> Option<TextureInfo>;
}

/// In-memory catalog keyed by lower-case texture name.
#[derive(Debug, Clone, Default)]
pub struct NamedTextures {
    entries: BTreeMap<String, TextureInfo>,
}

impl NamedTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, width: u32, height: u32) -> Self {
        self.entries
            .insert(name.to_ascii_lowercase(), TextureInfo { width, height });
        self
    }
}

impl TextureCatalog for NamedTextures {
    fn lookup(&self, name: &str) -> Option<TextureInfo> {
        self.entries.get(&name.to_ascii_lowercase()).copied()
    }
}

/// Viewport and texture environment a frame is rendered into.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub aspect_x: f32,
    pub aspect_y: f32,
    pub inv_aspect_x: f32,
    pub inv_aspect_y: f32,
    pub textures: Option<Arc<dyn TextureCatalog>>,
}

impl RenderContext {
    /// Derives aspect ratios so the longer side maps to 1.
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        let width = viewport_width.max(1) as f32;
        let height = viewport_height.max(1) as f32;
        let (aspect_x, aspect_y) = if width >= height {
            (1.0, height / width)
        } else {
            (width / height, 1.0)
        };
        Self {
            viewport_width,
            viewport_height,
            aspect_x,
            aspect_y,
            inv_aspect_x: 1.0 / aspect_x,
            inv_aspect_y: 1.0 / aspect_y,
            textures: None,
        }
    }

    pub fn with_textures(mut self, catalog: Arc<dyn TextureCatalog>) -> Self {
        self.textures = Some(catalog);
        self
    }

    pub fn size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn lookup_texture(&self, name: &str) -> Option<TextureInfo> {
        self.textures.as_ref()?.lookup(name)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Everything one preset instance mutates while rendering.
#[derive(Debug, Default)]
pub struct PresetState {
    pub globals: GlobalBank,
    /// `q` channels published by the last per-frame evaluation.
    pub q: [f64; Q_COUNT],
    pub audio: FrameAudioData,
    pub context: RenderContext,
    pub textures: TextureRegistry,
    /// Color attachment the warp pass and textured overlays read from.
    pub main_texture: Option<TextureHandle>,
}

impl PresetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the frame inputs in, reusing the audio buffers.
    pub fn snapshot(&mut self, audio: &FrameAudioData, context: &RenderContext) {
        self.audio.copy_from(audio);
        self.context.clone_from(context);
    }
}

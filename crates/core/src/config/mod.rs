use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{RenderError, Result};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mesh: MeshConfig,
    pub attachments: AttachmentConfig,
    pub compat: CompatConfig,
}

impl EngineConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Mesh grids must be even in both directions so the seam falls between
    /// two vertex lines, and large enough to have a cell on each side of it.
    pub fn validate(&self) -> Result<()> {
        for (label, width, height) in [
            ("warp", self.mesh.warp_width, self.mesh.warp_height),
            ("composite", self.mesh.composite_width, self.mesh.composite_height),
        ] {
            if width < 4 || height < 4 || width % 2 != 0 || height % 2 != 0 {
                return Err(RenderError::Config(format!(
                    "{label} mesh must be even and at least 4x4, got {width}x{height}"
                )));
            }
        }
        Ok(())
    }
}

/// Grid resolutions of the two full-screen meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub warp_width: u32,
    pub warp_height: u32,
    pub composite_width: u32,
    pub composite_height: u32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            warp_width: 48,
            warp_height: 36,
            composite_width: 32,
            composite_height: 24,
        }
    }
}

/// Pixel formats of the offscreen attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub color: AttachmentFormat,
    pub motion: AttachmentFormat,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            color: AttachmentFormat::Rgba8,
            motion: AttachmentFormat::Rg32Float,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentFormat {
    Rgba8,
    Rgba16Float,
    Rg32Float,
}

/// Switches that reproduce quirks of the reference renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Use the default composite body whenever the warp shader text is empty,
    /// regardless of the composite text itself.
    pub composite_follows_warp_source: bool,
}

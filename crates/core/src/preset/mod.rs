//! Already-parsed preset content.
//!
//! Turning `.milk` text into this structure happens outside the engine; the
//! JSON form exists so presets can be fed to the binary and to tests.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::shader::ShaderSource;
use crate::{LoadError, Result};

pub const MAX_SHAPES: usize = 4;
pub const MAX_WAVES: usize = 4;

/// Initial values, code and shader text of one preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetDescription {
    pub name: String,
    /// Initial variable values, keyed by variable name.
    pub values: BTreeMap<String, f64>,
    pub init_code: String,
    pub per_frame_code: String,
    pub per_pixel_code: String,
    pub warp_shader: ShaderSource,
    pub composite_shader: ShaderSource,
    pub shapes: Vec<ShapeDescription>,
    pub waves: Vec<WaveDescription>,
}

impl PresetDescription {
    pub fn from_json_str(text: &str) -> std::result::Result<Self, LoadError> {
        serde_json::from_str(text).map_err(|err| LoadError::Parse(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut description = Self::from_json_str(&text)?;
        if description.name.is_empty() {
            if let Some(stem) = path.file_stem() {
                description.name = stem.to_string_lossy().into_owned();
            }
        }
        Ok(description)
    }

    /// Shapes the engine loads; anything past [`MAX_SHAPES`] is ignored.
    pub fn shapes(&self) -> &[ShapeDescription] {
        &self.shapes[..self.shapes.len().min(MAX_SHAPES)]
    }

    /// Waves the engine loads; anything past [`MAX_WAVES`] is ignored.
    pub fn waves(&self) -> &[WaveDescription] {
        &self.waves[..self.waves.len().min(MAX_WAVES)]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeDescription {
    pub enabled: bool,
    pub values: BTreeMap<String, f64>,
    pub init_code: String,
    pub per_frame_code: String,
    pub shader: ShaderSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveDescription {
    pub enabled: bool,
    pub values: BTreeMap<String, f64>,
    pub init_code: String,
    pub per_frame_code: String,
    pub per_point_code: String,
    pub shader: ShaderSource,
}

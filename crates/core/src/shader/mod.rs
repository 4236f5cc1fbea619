//! Preset shader preparation and compile-with-fallback selection.
//!
//! Shader text arrives as the body-only dialect presets are written in: an
//! optional header of declarations followed by `shader_body { ... }`. The
//! backend receives the assembled text and never sees a program whose
//! samplers do not resolve.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::render::{ProgramId, RenderBackend};
use crate::state::{RenderContext, TextureInfo};
use crate::{LoadError, ShaderError};

/// Passthrough body used when a declared shader is empty or broken.
pub const DEFAULT_SHADER_BODY: &str = "shader_body\n{\nret = tex2D(sampler_main, uv).xyz;\n}";

const BODY_MARKER: &str = "shader_body";
const SAMPLER_PREFIX: &str = "sampler_";

/// Program slot a shader is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderSlot {
    Warp,
    Composite,
    Shape(usize),
    Wave(usize),
}

impl fmt::Display for ShaderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warp => f.write_str("warp"),
            Self::Composite => f.write_str("composite"),
            Self::Shape(index) => write!(f, "shape {index}"),
            Self::Wave(index) => write!(f, "wave {index}"),
        }
    }
}

/// Shader text as declared by the preset. A version of 0 or less means the
/// preset uses the slot's fixed-function behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSource {
    pub version: i32,
    pub code: String,
}

impl ShaderSource {
    pub fn new(version: i32, code: impl Into<String>) -> Self {
        Self {
            version,
            code: code.into(),
        }
    }

    pub fn is_declared(&self) -> bool {
        self.version > 0
    }
}

/// Shader text split into header and body with its sampler references.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedShader {
    pub header: String,
    pub body: String,
    /// Lower-case sampler names without the `sampler_` prefix, in order of
    /// first use.
    pub samplers: Vec<String>,
    /// Highest blur level the program reads, 0 if none.
    pub blur_level: u8,
}

/// Splits shader text and collects what it needs from the engine.
pub fn prepare(text: &str) -> Result<PreparedShader, ShaderError> {
    check_balance(text)?;

    let marker = text.find(BODY_MARKER).ok_or(ShaderError::MissingBody)?;
    let after = &text[marker + BODY_MARKER.len()..];
    let open = after.find('{').ok_or(ShaderError::MissingBody)?;
    let close = matching_brace(after, open).ok_or(ShaderError::Unbalanced('{'))?;

    let header = text[..marker].trim().to_string();
    let body = after[open + 1..close].trim().to_string();
    let samplers = sampler_names(text);
    let lower = text.to_ascii_lowercase();
    let blur_level = (1..=3u8)
        .rev()
        .find(|level| {
            samplers.iter().any(|s| strip_sampling(s).0 == format!("blur{level}"))
                || lower.contains(&format!("getblur{level}"))
        })
        .unwrap_or(0);

    Ok(PreparedShader {
        header,
        body,
        samplers,
        blur_level,
    })
}

fn check_balance(text: &str) -> Result<(), ShaderError> {
    let mut stack = Vec::new();
    for c in text.chars() {
        match c {
            '{' | '(' | '[' => stack.push(c),
            '}' | ')' | ']' => {
                let open = match c {
                    '}' => '{',
                    ')' => '(',
                    _ => '[',
                };
                if stack.pop() != Some(open) {
                    return Err(ShaderError::Unbalanced(c));
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(ShaderError::Unbalanced(open)),
        None => Ok(()),
    }
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn sampler_names(text: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    let mut names: Vec<String> = Vec::new();
    let mut rest = lower.as_str();
    let mut consumed = 0usize;

    while let Some(found) = rest.find(SAMPLER_PREFIX) {
        let start = consumed + found;
        let preceded_by_ident = lower[..start].chars().next_back().is_some_and(is_ident);
        let tail = &lower[start + SAMPLER_PREFIX.len()..];
        let len = tail.find(|c: char| !is_ident(c)).unwrap_or(tail.len());
        let name = &tail[..len];
        if !preceded_by_ident && !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        consumed = start + SAMPLER_PREFIX.len() + len;
        rest = &lower[consumed..];
    }
    names
}

/// Filtering and addressing requested through a sampler name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub linear: bool,
    pub wrap: bool,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            linear: true,
            wrap: true,
        }
    }
}

fn strip_sampling(name: &str) -> (&str, Sampling) {
    for (prefix, linear, wrap) in [
        ("fw_", true, true),
        ("fc_", true, false),
        ("pw_", false, true),
        ("pc_", false, false),
    ] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return (rest, Sampling { linear, wrap });
        }
    }
    (name, Sampling::default())
}

/// Where a sampler reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerSource {
    /// The previous frame (warp) or the current frame (composite).
    Main,
    Blur(u8),
    Noise,
    Catalog(TextureInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub source: SamplerSource,
    pub sampling: Sampling,
}

const NOISE_TEXTURES: [&str; 6] = [
    "noise_lq",
    "noise_lq_lite",
    "noise_mq",
    "noise_hq",
    "noisevol_lq",
    "noisevol_hq",
];

fn bind_sampler(name: &str, context: &RenderContext) -> Result<SamplerBinding, ShaderError> {
    let (texture, sampling) = strip_sampling(name);
    let source = match texture {
        "main" => SamplerSource::Main,
        "blur1" => SamplerSource::Blur(1),
        "blur2" => SamplerSource::Blur(2),
        "blur3" => SamplerSource::Blur(3),
        t if NOISE_TEXTURES.contains(&t) => SamplerSource::Noise,
        t => SamplerSource::Catalog(
            context
                .lookup_texture(t)
                .ok_or_else(|| ShaderError::UnboundSampler(name.to_string()))?,
        ),
    };
    Ok(SamplerBinding {
        name: name.to_string(),
        source,
        sampling,
    })
}

/// A program the backend accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProgram {
    pub slot: ShaderSlot,
    pub id: ProgramId,
    pub prepared: PreparedShader,
    pub bindings: Vec<SamplerBinding>,
    /// Text handed to the backend.
    pub text: String,
}

impl ShaderProgram {
    pub fn blur_level(&self) -> u8 {
        self.prepared.blur_level
    }

    /// Same text and bindings, ignoring which backend object holds it.
    pub fn same_behavior(&self, other: &ShaderProgram) -> bool {
        self.slot == other.slot
            && self.prepared == other.prepared
            && self.bindings == other.bindings
            && self.text == other.text
    }

    /// Resolves the bindings again after the render context changed.
    /// Bindings that no longer resolve keep their previous source.
    pub fn rebind(&mut self, context: &RenderContext) {
        for binding in &mut self.bindings {
            match bind_sampler(&binding.name, context) {
                Ok(fresh) => *binding = fresh,
                Err(err) => {
                    tracing::warn!(slot = %self.slot, error = %err, "keeping stale sampler binding")
                }
            }
        }
    }
}

/// Result of selecting a program for one slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderOutcome {
    /// No shader declared; the slot's fixed-function path is used.
    Passthrough,
    Compiled(ShaderProgram),
    /// The declared text failed and the default body replaced it.
    Substituted {
        program: ShaderProgram,
        reason: ShaderError,
    },
}

impl ShaderOutcome {
    pub fn program(&self) -> Option<&ShaderProgram> {
        match self {
            Self::Passthrough => None,
            Self::Compiled(program) | Self::Substituted { program, .. } => Some(program),
        }
    }

    pub fn program_mut(&mut self) -> Option<&mut ShaderProgram> {
        match self {
            Self::Passthrough => None,
            Self::Compiled(program) | Self::Substituted { program, .. } => Some(program),
        }
    }

    pub fn program_id(&self) -> Option<ProgramId> {
        self.program().map(|program| program.id)
    }

    pub fn is_substituted(&self) -> bool {
        matches!(self, Self::Substituted { .. })
    }
}

fn assemble(slot: ShaderSlot, prepared: &PreparedShader) -> String {
    let mut text = format!("// {slot}\n");
    if !prepared.header.is_empty() {
        text.push_str(&prepared.header);
        text.push('\n');
    }
    text.push_str(BODY_MARKER);
    text.push_str("\n{\n");
    text.push_str(&prepared.body);
    text.push_str("\n}\n");
    text
}

fn compile_text<B: RenderBackend + ?Sized>(
    backend: &mut B,
    slot: ShaderSlot,
    text: &str,
    context: &RenderContext,
) -> Result<ShaderProgram, ShaderError> {
    let prepared = prepare(text)?;
    let bindings = prepared
        .samplers
        .iter()
        .map(|name| bind_sampler(name, context))
        .collect::<Result<Vec<_>, _>>()?;
    let text = assemble(slot, &prepared);
    let id = backend.compile_program(slot, &text)?;
    Ok(ShaderProgram {
        slot,
        id,
        prepared,
        bindings,
        text,
    })
}

/// Selects and compiles the program for `slot`. Only a failure of the
/// built-in default body is an error.
pub fn compile_with_fallback<B: RenderBackend + ?Sized>(
    backend: &mut B,
    slot: ShaderSlot,
    source: &ShaderSource,
    context: &RenderContext,
) -> Result<ShaderOutcome, LoadError> {
    if !source.is_declared() {
        tracing::debug!(%slot, "no shader declared, using fixed-function path");
        return Ok(ShaderOutcome::Passthrough);
    }

    let code = if source.code.trim().is_empty() {
        DEFAULT_SHADER_BODY
    } else {
        source.code.as_str()
    };

    match compile_text(backend, slot, code, context) {
        Ok(program) => {
            tracing::debug!(%slot, samplers = program.bindings.len(), "compiled shader");
            Ok(ShaderOutcome::Compiled(program))
        }
        Err(reason) => {
            tracing::warn!(%slot, error = %reason, "shader rejected, substituting default body");
            let program = compile_text(backend, slot, DEFAULT_SHADER_BODY, context)
                .map_err(|source| LoadError::DefaultShader { slot, source })?;
            Ok(ShaderOutcome::Substituted { program, reason })
        }
    }
}

use std::collections::BTreeMap;

use super::backend::{Pass, PassKind, ProgramId, RenderBackend, TextureId};
use crate::config::AttachmentFormat;
use crate::shader::{self, ShaderSlot};
use crate::{GpuError, ShaderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRecord {
    pub format: AttachmentFormat,
    pub width: u32,
    pub height: u32,
}

/// Backend without a GPU. It validates shader text and resource usage,
/// records the kind of every submitted pass and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    textures: BTreeMap<TextureId, TextureRecord>,
    programs: BTreeMap<ProgramId, (ShaderSlot, String)>,
    compiled: usize,
    trace: Vec<PassKind>,
    fail_marker: Option<String>,
    texture_limit: Option<usize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every program whose text contains `marker`.
    pub fn fail_compiles_containing(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Fails texture creation once `limit` textures are alive.
    pub fn with_texture_limit(mut self, limit: usize) -> Self {
        self.texture_limit = Some(limit);
        self
    }

    pub fn set_texture_limit(&mut self, limit: Option<usize>) {
        self.texture_limit = limit;
    }

    pub fn trace(&self) -> &[PassKind] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<PassKind> {
        std::mem::take(&mut self.trace)
    }

    /// Number of successful compiles since creation.
    pub fn compiled_programs(&self) -> usize {
        self.compiled
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture(&self, id: TextureId) -> Option<TextureRecord> {
        self.textures.get(&id).copied()
    }

    pub fn program_text(&self, id: ProgramId) -> Option<&str> {
        self.programs.get(&id).map(|(_, text)| text.as_str())
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn check_texture(&self, id: TextureId) -> Result<(), GpuError> {
        if self.textures.contains_key(&id) {
            Ok(())
        } else {
            Err(GpuError::UnknownResource(id.0))
        }
    }

    fn check_program(&self, id: Option<ProgramId>) -> Result<(), GpuError> {
        match id {
            Some(id) if !self.programs.contains_key(&id) => Err(GpuError::UnknownResource(id.0)),
            _ => Ok(()),
        }
    }

    fn validate(&self, pass: &Pass<'_>) -> Result<(), GpuError> {
        match pass {
            Pass::MotionVectors { target, .. } => self.check_texture(*target),
            Pass::BindTargets { read, draw } => {
                for id in [read.color, read.motion, draw.color, draw.motion] {
                    self.check_texture(id)?;
                }
                Ok(())
            }
            Pass::Warp {
                source, program, ..
            } => {
                self.check_texture(*source)?;
                self.check_program(*program)
            }
            Pass::UpdateBlur {
                source, targets, ..
            } => {
                self.check_texture(*source)?;
                targets.iter().try_for_each(|id| self.check_texture(*id))
            }
            Pass::Shape { program, .. } | Pass::CustomWave { program, .. } => {
                self.check_program(*program)
            }
            Pass::Composite {
                source,
                target,
                program,
                ..
            } => {
                self.check_texture(*source)?;
                self.check_texture(*target)?;
                self.check_program(*program)
            }
            Pass::Present { source, .. } => self.check_texture(*source),
            Pass::BeginFrame { .. }
            | Pass::MaskMotion(_)
            | Pass::Clear { .. }
            | Pass::Waveform { .. }
            | Pass::Darken { .. }
            | Pass::Border { .. } => Ok(()),
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn create_texture(
        &mut self,
        format: AttachmentFormat,
        width: u32,
        height: u32,
    ) -> Result<TextureId, GpuError> {
        let exhausted = self
            .texture_limit
            .is_some_and(|limit| self.textures.len() >= limit);
        if exhausted || width == 0 || height == 0 {
            return Err(GpuError::Allocation {
                what: "texture",
                width,
                height,
            });
        }
        let id = TextureId(self.next());
        self.textures.insert(
            id,
            TextureRecord {
                format,
                width,
                height,
            },
        );
        Ok(id)
    }

    fn resize_texture(&mut self, id: TextureId, width: u32, height: u32) -> Result<(), GpuError> {
        if width == 0 || height == 0 {
            return Err(GpuError::Allocation {
                what: "texture",
                width,
                height,
            });
        }
        let record = self
            .textures
            .get_mut(&id)
            .ok_or(GpuError::UnknownResource(id.0))?;
        record.width = width;
        record.height = height;
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    fn compile_program(&mut self, slot: ShaderSlot, text: &str) -> Result<ProgramId, ShaderError> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(ShaderError::Compile(format!("rejected {slot} program")));
            }
        }
        shader::prepare(text)?;

        let id = ProgramId(self.next());
        self.programs.insert(id, (slot, text.to_string()));
        self.compiled += 1;
        Ok(id)
    }

    fn delete_program(&mut self, id: ProgramId) {
        self.programs.remove(&id);
    }

    fn submit(&mut self, pass: Pass<'_>) -> Result<(), GpuError> {
        self.validate(&pass)?;
        self.trace.push(pass.kind());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_limit_reports_allocation_failure() {
        let mut backend = RecordingBackend::new().with_texture_limit(1);
        backend
            .create_texture(AttachmentFormat::Rgba8, 4, 4)
            .unwrap();
        let err = backend
            .create_texture(AttachmentFormat::Rgba8, 4, 4)
            .unwrap_err();
        assert_eq!(
            err,
            GpuError::Allocation {
                what: "texture",
                width: 4,
                height: 4
            }
        );
    }

    #[test]
    fn passes_naming_deleted_textures_are_rejected() {
        let mut backend = RecordingBackend::new();
        let id = backend
            .create_texture(AttachmentFormat::Rgba8, 4, 4)
            .unwrap();
        backend
            .submit(Pass::Present {
                source: id,
                width: 4,
                height: 4,
            })
            .unwrap();

        backend.delete_texture(id);
        let err = backend
            .submit(Pass::Present {
                source: id,
                width: 4,
                height: 4,
            })
            .unwrap_err();
        assert_eq!(err, GpuError::UnknownResource(id.0));
        assert_eq!(backend.trace(), &[PassKind::Present]);
    }

    #[test]
    fn compile_validates_text() {
        let mut backend = RecordingBackend::new();
        assert!(backend
            .compile_program(ShaderSlot::Warp, "shader_body { ret = 0; }")
            .is_ok());
        assert!(backend
            .compile_program(ShaderSlot::Warp, "shader_body { ret = 0;")
            .is_err());
        assert_eq!(backend.compiled_programs(), 1);
    }
}

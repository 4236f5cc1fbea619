use super::backend::{RenderBackend, TextureId};
use crate::config::AttachmentFormat;
use crate::GpuError;

/// Highest blur level a shader can read.
pub const MAX_BLUR_LEVEL: u8 = 3;

/// Size of blur level `level` (1-based) for a `width` x `height` image.
/// Each level halves the previous one.
pub fn blur_size(level: u8, width: u32, height: u32) -> (u32, u32) {
    let shift = u32::from(level.clamp(1, MAX_BLUR_LEVEL));
    ((width >> shift).max(1), (height >> shift).max(1))
}

/// Downsampled copies of the warped image, allocated only up to the level
/// the compiled shaders use.
#[derive(Debug, Default)]
pub struct BlurTextures {
    levels: Vec<TextureId>,
    size: (u32, u32),
}

impl BlurTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        level: u8,
        width: u32,
        height: u32,
    ) -> Result<(), GpuError> {
        let level = level.min(MAX_BLUR_LEVEL);
        if self.size != (width, height) {
            for (index, id) in self.levels.iter().enumerate() {
                let (w, h) = blur_size(index as u8 + 1, width, height);
                backend.resize_texture(*id, w, h)?;
            }
            self.size = (width, height);
        }
        while self.levels.len() < usize::from(level) {
            let (w, h) = blur_size(self.levels.len() as u8 + 1, width, height);
            let id = backend.create_texture(AttachmentFormat::Rgba8, w, h)?;
            self.levels.push(id);
        }
        Ok(())
    }

    pub fn level(&self) -> u8 {
        self.levels.len() as u8
    }

    pub fn targets(&self) -> &[TextureId] {
        &self.levels
    }

    pub fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for id in self.levels.drain(..) {
            backend.delete_texture(id);
        }
        self.size = (0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingBackend;

    #[test]
    fn levels_halve_and_never_reach_zero() {
        assert_eq!(blur_size(1, 640, 480), (320, 240));
        assert_eq!(blur_size(3, 640, 480), (80, 60));
        assert_eq!(blur_size(3, 4, 4), (1, 1));
    }

    #[test]
    fn ensure_allocates_then_resizes() {
        let mut backend = RecordingBackend::new();
        let mut blur = BlurTextures::new();

        blur.ensure(&mut backend, 2, 64, 32).unwrap();
        assert_eq!(blur.level(), 2);
        blur.ensure(&mut backend, 1, 64, 32).unwrap();
        assert_eq!(backend.live_textures(), 2);

        blur.ensure(&mut backend, 2, 128, 64).unwrap();
        let second = backend.texture(blur.targets()[1]).unwrap();
        assert_eq!((second.width, second.height), (32, 16));

        blur.release(&mut backend);
        assert_eq!(backend.live_textures(), 0);
    }
}

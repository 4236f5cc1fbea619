use super::backend::{BufferSet, RenderBackend, TextureId};
use crate::config::AttachmentConfig;
use crate::GpuError;

/// Two offscreen buffers, one holding the previous frame and one being
/// drawn. Their roles swap after every frame.
#[derive(Debug)]
pub struct FramebufferPair {
    buffers: [BufferSet; 2],
    current: usize,
    width: u32,
    height: u32,
}

impl FramebufferPair {
    pub fn create<B: RenderBackend + ?Sized>(
        backend: &mut B,
        formats: &AttachmentConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let (width, height) = (width.max(1), height.max(1));
        let mut created: Vec<TextureId> = Vec::with_capacity(4);
        for format in [formats.color, formats.motion, formats.color, formats.motion] {
            match backend.create_texture(format, width, height) {
                Ok(id) => created.push(id),
                Err(err) => {
                    for id in created {
                        backend.delete_texture(id);
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            buffers: [
                BufferSet {
                    color: created[0],
                    motion: created[1],
                },
                BufferSet {
                    color: created[2],
                    motion: created[3],
                },
            ],
            current: 0,
            width,
            height,
        })
    }

    /// Resizes every attachment. Returns whether the size changed.
    pub fn set_size<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> Result<bool, GpuError> {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }
        for id in self.attachments() {
            backend.resize_texture(id, width, height)?;
        }
        self.width = width;
        self.height = height;
        Ok(true)
    }

    pub fn current(&self) -> BufferSet {
        self.buffers[self.current]
    }

    pub fn previous(&self) -> BufferSet {
        self.buffers[1 - self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Color attachments in buffer order.
    pub fn colors(&self) -> [TextureId; 2] {
        [self.buffers[0].color, self.buffers[1].color]
    }

    pub fn attachments(&self) -> [TextureId; 4] {
        [
            self.buffers[0].color,
            self.buffers[0].motion,
            self.buffers[1].color,
            self.buffers[1].motion,
        ]
    }

    pub fn release<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        for id in self.attachments() {
            backend.delete_texture(id);
        }
    }
}

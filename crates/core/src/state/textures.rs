use crate::render::TextureId;

/// Generational reference into a [`TextureRegistry`]. A handle whose entry
/// was removed or replaced resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureEntry {
    pub name: String,
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<TextureEntry>,
}

/// Textures owned by one preset.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: TextureEntry) -> TextureHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return TextureHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        TextureHandle {
            index,
            generation: 0,
        }
    }

    /// Removes the entry and invalidates every copy of `handle`.
    pub fn remove(&mut self, handle: TextureHandle) -> Option<TextureEntry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(entry)
    }

    pub fn resolve(&self, handle: TextureHandle) -> Option<&TextureEntry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub fn find(&self, name: &str) -> Option<TextureHandle> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.entry
                .as_ref()
                .filter(|entry| entry.name == name)
                .map(|_| TextureHandle {
                    index: index as u32,
                    generation: slot.generation,
                })
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains every live entry, leaving all outstanding handles stale.
    pub fn drain(&mut self) -> Vec<TextureEntry> {
        let mut entries = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = slot.entry.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                entries.push(entry);
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: u32) -> TextureEntry {
        TextureEntry {
            name: name.into(),
            id: TextureId(id),
            width: 4,
            height: 4,
        }
    }

    #[test]
    fn removed_handles_go_stale_even_after_reuse() {
        let mut registry = TextureRegistry::new();
        let first = registry.insert(entry("main", 1));
        assert_eq!(registry.resolve(first).map(|e| e.id), Some(TextureId(1)));

        assert!(registry.remove(first).is_some());
        assert!(registry.resolve(first).is_none());
        assert!(registry.remove(first).is_none());

        let second = registry.insert(entry("main", 2));
        assert!(registry.resolve(first).is_none());
        assert_eq!(registry.resolve(second).map(|e| e.id), Some(TextureId(2)));
        assert_eq!(registry.find("main"), Some(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn drain_invalidates_everything() {
        let mut registry = TextureRegistry::new();
        let a = registry.insert(entry("a", 1));
        let b = registry.insert(entry("b", 2));

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.resolve(a).is_none());
        assert!(registry.resolve(b).is_none());
    }
}

/// Entries per lazily allocated block.
pub const MEMORY_BLOCK_SIZE: usize = 65_536;
/// Upper bound on blocks; indices beyond read as zero and drop writes.
pub const MEMORY_BLOCK_COUNT: usize = 128;

/// Sparse `megabuf`-style memory addressed by floating point index.
///
/// Blocks are allocated on first write, so a preset that keeps touching the
/// same addresses stops allocating after its first frames.
#[derive(Debug, Default, Clone)]
pub struct MemoryBank {
    blocks: Vec<Option<Box<[f64]>>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: f64) -> f64 {
        let Some((block, offset)) = locate(index) else {
            return 0.0;
        };
        self.blocks
            .get(block)
            .and_then(|slot| slot.as_ref())
            .map_or(0.0, |data| data[offset])
    }

    pub fn set(&mut self, index: f64, value: f64) {
        let Some((block, offset)) = locate(index) else {
            return;
        };
        if self.blocks.len() <= block {
            self.blocks.resize_with(block + 1, || None);
        }
        let data = self.blocks[block]
            .get_or_insert_with(|| vec![0.0; MEMORY_BLOCK_SIZE].into_boxed_slice());
        data[offset] = value;
    }

    /// Number of blocks currently backed by storage.
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

fn locate(index: f64) -> Option<(usize, usize)> {
    if !index.is_finite() || index < 0.0 {
        return None;
    }
    // Matches the rounding slack the formula language uses for addresses.
    let address = (index + 0.0001) as usize;
    if address >= MEMORY_BLOCK_SIZE * MEMORY_BLOCK_COUNT {
        return None;
    }
    Some((address / MEMORY_BLOCK_SIZE, address % MEMORY_BLOCK_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_cells_read_zero() {
        let memory = MemoryBank::new();
        assert_eq!(memory.get(42.0), 0.0);
        assert_eq!(memory.allocated_blocks(), 0);
    }

    #[test]
    fn writes_round_to_nearest_address_below() {
        let mut memory = MemoryBank::new();
        memory.set(9.99995, 3.0);
        assert_eq!(memory.get(10.0), 3.0);
        memory.set(70_000.0, 1.0);
        assert_eq!(memory.allocated_blocks(), 2);
    }

    #[test]
    fn invalid_addresses_are_ignored() {
        let mut memory = MemoryBank::new();
        memory.set(-1.0, 5.0);
        memory.set(f64::NAN, 5.0);
        memory.set((MEMORY_BLOCK_SIZE * MEMORY_BLOCK_COUNT) as f64, 5.0);
        assert_eq!(memory.allocated_blocks(), 0);
        assert_eq!(memory.get(-1.0), 0.0);
    }
}

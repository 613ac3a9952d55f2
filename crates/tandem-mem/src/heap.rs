use crate::arena::align_up;
use std::collections::BTreeMap;

/// First-fit allocator over `[base, base + capacity)` whose blocks can be
/// freed individually.
///
/// Free space is a map of disjoint `start -> end` ranges. Freeing a block
/// merges it with adjacent free ranges, so a heap whose blocks have all been
/// freed is a single range again.
#[derive(Debug, Clone)]
pub struct Heap {
    base: u32,
    capacity: u32,
    free: BTreeMap<u32, u32>,
    live: BTreeMap<u32, u32>,
}

impl Heap {
    /// `base` must be nonzero and the range must fit in 32 bits.
    pub fn new(base: u32, capacity: u32) -> Self {
        assert!(base != 0, "heap base must not be the null address");
        assert!(
            base.checked_add(capacity).is_some(),
            "heap range overflows the 32-bit address space"
        );
        let mut free = BTreeMap::new();
        if capacity > 0 {
            free.insert(base, base + capacity);
        }
        Self {
            base,
            capacity,
            free,
            live: BTreeMap::new(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes not covered by a live block.
    pub fn free_bytes(&self) -> u32 {
        self.free.iter().map(|(start, end)| end - start).sum()
    }

    /// Number of blocks not yet freed.
    pub fn live_blocks(&self) -> usize {
        self.live.len()
    }

    /// Allocate `size` bytes aligned to `alignment`. A zero-byte request
    /// still gets its own address.
    pub fn alloc(&mut self, size: u32, alignment: u32) -> Option<u32> {
        let alignment = alignment.max(1);
        let size = size.max(1);
        let (start, end, addr) = self.free.iter().find_map(|(&start, &end)| {
            let addr = align_up(start, alignment)?;
            let block_end = addr.checked_add(size)?;
            (block_end <= end).then_some((start, end, addr))
        })?;

        self.free.remove(&start);
        if start < addr {
            self.free.insert(start, addr);
        }
        if addr + size < end {
            self.free.insert(addr + size, end);
        }
        self.live.insert(addr, addr + size);
        Some(addr)
    }

    /// Return the block at `addr` to the heap. Returns its size, or `None` if
    /// `addr` is not the start of a live block.
    pub fn free(&mut self, addr: u32) -> Option<u32> {
        let end = self.live.remove(&addr)?;
        let mut start = addr;
        let mut stop = end;
        if let Some((&prev_start, &prev_end)) = self.free.range(..addr).next_back() {
            if prev_end == addr {
                self.free.remove(&prev_start);
                start = prev_start;
            }
        }
        if let Some(next_end) = self.free.remove(&end) {
            stop = next_end;
        }
        self.free.insert(start, stop);
        Some(end - addr)
    }

    /// Free every block.
    pub fn reset(&mut self) {
        self.live.clear();
        self.free.clear();
        if self.capacity > 0 {
            self.free.insert(self.base, self.base + self.capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_space_is_reused() {
        let mut heap = Heap::new(0x1000, 0x100);
        assert_eq!(heap.alloc(0x80, 8), Some(0x1000));
        assert_eq!(heap.alloc(0x80, 8), Some(0x1080));
        assert_eq!(heap.alloc(1, 1), None);

        assert_eq!(heap.free(0x1000), Some(0x80));
        assert_eq!(heap.alloc(0x40, 8), Some(0x1000));
        assert_eq!(heap.alloc(0x40, 8), Some(0x1040));
        assert_eq!(heap.free_bytes(), 0);
    }

    #[test]
    fn neighbours_merge_on_free() {
        let mut heap = Heap::new(0x1000, 0x30);
        let a = heap.alloc(0x10, 1).unwrap();
        let b = heap.alloc(0x10, 1).unwrap();
        let c = heap.alloc(0x10, 1).unwrap();
        heap.free(a).unwrap();
        heap.free(c).unwrap();
        // Two separate 0x10 holes: a 0x20 block does not fit yet.
        assert_eq!(heap.alloc(0x20, 1), None);
        heap.free(b).unwrap();
        assert_eq!(heap.live_blocks(), 0);
        assert_eq!(heap.alloc(0x30, 1), Some(0x1000));
    }

    #[test]
    fn alignment_padding_is_returned() {
        let mut heap = Heap::new(0x1004, 0x1C);
        assert_eq!(heap.alloc(8, 8), Some(0x1008));
        // The 4 bytes skipped for alignment are still free.
        assert_eq!(heap.alloc(4, 4), Some(0x1004));
        assert_eq!(heap.free(0x1008), Some(8));
        assert_eq!(heap.free_bytes(), 0x1C - 4);
    }

    #[test]
    fn unknown_and_double_free() {
        let mut heap = Heap::new(0x10, 0x10);
        let a = heap.alloc(0, 4).unwrap();
        let b = heap.alloc(0, 4).unwrap();
        assert_ne!(a, b);
        assert_eq!(heap.free(a + 1), None);
        assert_eq!(heap.free(a), Some(1));
        assert_eq!(heap.free(a), None);
    }

    #[test]
    fn reset_frees_everything() {
        let mut heap = Heap::new(0x10, 0x10);
        heap.alloc(0x10, 1).unwrap();
        heap.reset();
        assert_eq!(heap.free_bytes(), 0x10);
        assert_eq!(heap.alloc(0x10, 1), Some(0x10));
    }
}

use std::fmt;

/// Round the address `value` up to a multiple of `alignment` (nonzero).
///
/// `None` when the rounded address would not fit in 32 bits.
pub fn align_up(value: u32, alignment: u32) -> Option<u32> {
    debug_assert!(alignment > 0);
    let add = alignment - 1;
    value.checked_add(add).map(|v| v / alignment * alignment)
}

/// Bump allocator over the native address range `[base, base + capacity)`.
///
/// Draw-sequence builders take their records and strings from one of these
/// and give the whole range back at once with [`reset`](Self::reset). Only
/// addresses are tracked; the bytes behind them are never touched.
#[derive(Clone)]
pub struct Arena {
    base: u32,
    capacity: u32,
    cursor: u32,
}

impl Arena {
    /// `base` must be nonzero (0 is the null pointer) and the range must fit
    /// in the 32-bit address space.
    pub fn new(base: u32, capacity: u32) -> Self {
        assert!(base != 0, "arena base must not be the null address");
        assert!(
            base.checked_add(capacity).is_some(),
            "arena range overflows the 32-bit address space"
        );
        Self {
            base,
            capacity,
            cursor: base,
        }
    }

    /// Forget every allocation.
    pub fn reset(&mut self) {
        self.cursor = self.base;
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn remaining(&self) -> u32 {
        self.end().saturating_sub(self.cursor)
    }

    /// Address the next unaligned allocation would start at.
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    fn end(&self) -> u32 {
        self.base + self.capacity
    }

    /// Address of a fresh `size`-byte block aligned to `alignment`, or `None`
    /// once the range is used up.
    pub fn alloc(&mut self, size: u32, alignment: u32) -> Option<u32> {
        let aligned = align_up(self.cursor, alignment.max(1))?;
        let end = aligned.checked_add(size)?;
        if end > self.end() {
            return None;
        }
        self.cursor = end;
        Some(aligned)
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("base", &format_args!("0x{:x}", self.base))
            .field("capacity", &self.capacity)
            .field("cursor", &format_args!("0x{:x}", self.cursor))
            .finish()
    }
}

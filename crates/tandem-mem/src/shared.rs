//! Linear memory shared between the worker and the foreground thread.
//!
//! The backing store is a slice of `AtomicU32` words (the Rust analogue of a
//! `SharedArrayBuffer` viewed through an `Int32Array`). Every access is an
//! atomic word operation, so two handles on different threads never race in
//! the data-race sense; ordering between a producer's writes and a consumer's
//! reads is established by the signal / ring-buffer handshake that hands over
//! an address.

use crate::memory::{check_align, Memory, MemoryError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct SharedMemory {
    words: Arc<[AtomicU32]>,
}

impl SharedMemory {
    /// Allocate zeroed shared memory. `size_bytes` is rounded up to a whole word.
    pub fn new(size_bytes: usize) -> Self {
        let words = size_bytes.div_ceil(4);
        Self {
            words: (0..words).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<(), MemoryError> {
        let end = (addr as usize)
            .checked_add(len)
            .ok_or(MemoryError::OutOfBounds { addr, len })?;
        if end > self.size() {
            return Err(MemoryError::OutOfBounds { addr, len });
        }
        Ok(())
    }

    /// Returns `true` if both handles refer to the same backing words.
    pub fn same_backing(&self, other: &SharedMemory) -> bool {
        Arc::ptr_eq(&self.words, &other.words)
    }
}

impl std::fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("size_bytes", &self.size())
            .finish()
    }
}

impl Memory for SharedMemory {
    fn size(&self) -> usize {
        self.words.len() * 4
    }

    fn read_bytes(&self, addr: u32, dst: &mut [u8]) -> Result<(), MemoryError> {
        self.check_range(addr, dst.len())?;
        let mut word_index = usize::MAX;
        let mut word = [0u8; 4];
        for (i, out) in dst.iter_mut().enumerate() {
            let byte_addr = addr as usize + i;
            if byte_addr / 4 != word_index {
                word_index = byte_addr / 4;
                word = self.words[word_index].load(Ordering::Acquire).to_le_bytes();
            }
            *out = word[byte_addr % 4];
        }
        Ok(())
    }

    fn write_bytes(&mut self, addr: u32, src: &[u8]) -> Result<(), MemoryError> {
        self.check_range(addr, src.len())?;
        let mut offset = 0usize;
        while offset < src.len() {
            let byte_addr = addr as usize + offset;
            let word_index = byte_addr / 4;
            let lane = byte_addr % 4;
            let n = (4 - lane).min(src.len() - offset);

            if lane == 0 && n == 4 {
                let value = u32::from_le_bytes([
                    src[offset],
                    src[offset + 1],
                    src[offset + 2],
                    src[offset + 3],
                ]);
                self.words[word_index].store(value, Ordering::Release);
            } else {
                let mut mask = 0u32;
                let mut value = 0u32;
                for k in 0..n {
                    let shift = ((lane + k) * 8) as u32;
                    mask |= 0xFF << shift;
                    value |= (src[offset + k] as u32) << shift;
                }
                // Partial word: only this write's lanes change, so bytes the
                // other side writes into the same word are preserved.
                let word = &self.words[word_index];
                word.fetch_and(!mask, Ordering::AcqRel);
                word.fetch_or(value, Ordering::AcqRel);
            }
            offset += n;
        }
        Ok(())
    }

    fn read_u32(&self, addr: u32) -> Result<u32, MemoryError> {
        check_align(addr, 4)?;
        self.check_range(addr, 4)?;
        Ok(self.words[addr as usize / 4].load(Ordering::Acquire))
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        check_align(addr, 4)?;
        self.check_range(addr, 4)?;
        self.words[addr as usize / 4].store(value, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_share_backing_words() {
        let mut a = SharedMemory::new(32);
        let b = a.clone();
        assert!(a.same_backing(&b));

        a.write_u32(8, 0xDEAD_BEEF).unwrap();
        assert_eq!(b.read_u32(8).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn unaligned_byte_ranges_preserve_neighbours() {
        let mut mem = SharedMemory::new(16);
        mem.write_u32(0, 0xAAAA_AAAA).unwrap();
        mem.write_u32(4, 0xBBBB_BBBB).unwrap();

        mem.write_bytes(3, &[1, 2]).unwrap();

        let mut out = [0u8; 8];
        mem.read_bytes(0, &mut out).unwrap();
        assert_eq!(out, [0xAA, 0xAA, 0xAA, 1, 2, 0xBB, 0xBB, 0xBB]);
    }

    #[test]
    fn f64_and_strings_work_through_word_storage() {
        let mut mem = SharedMemory::new(64);
        mem.write_f64(16, -3.25).unwrap();
        assert_eq!(mem.read_f64(16).unwrap(), -3.25);

        mem.write_cstr(33, "abc").unwrap();
        assert_eq!(mem.read_cstr(33).unwrap(), "abc");
    }

    #[test]
    fn partial_word_writes_keep_neighbouring_bytes() {
        let mut mem = SharedMemory::new(16);
        mem.write_u32(4, 0xAABB_CCDD).unwrap();
        let other = mem.clone();
        mem.write_bytes(5, &[0x11, 0x22]).unwrap();
        assert_eq!(other.read_u32(4).unwrap(), 0xAA22_11DD);

        mem.write_bytes(3, &[0x01, 0x02]).unwrap();
        assert_eq!(other.read_u32(0).unwrap(), 0x0100_0000);
        assert_eq!(other.read_u32(4).unwrap(), 0xAA22_1102);
    }

    #[test]
    fn shared_memory_cannot_be_borrowed() {
        let mem = SharedMemory::new(16);
        assert_eq!(
            mem.borrow_bytes(0, 4),
            Err(MemoryError::Unaliasable { addr: 0, len: 4 })
        );
    }

    #[test]
    fn size_rounds_up_to_words() {
        assert_eq!(SharedMemory::new(5).size(), 8);
        let mem = SharedMemory::new(8);
        assert!(mem.read_u32(8).is_err());
    }
}

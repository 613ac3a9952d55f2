use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory access out of bounds: addr=0x{addr:x}, len=0x{len:x}")]
    OutOfBounds { addr: u32, len: usize },
    #[error("misaligned {align}-byte access at 0x{addr:x}")]
    Misaligned { addr: u32, align: u32 },
    #[error("memory range addr=0x{addr:x}, len=0x{len:x} cannot be borrowed without a copy")]
    Unaliasable { addr: u32, len: usize },
    #[error("string at 0x{addr:x} runs past the end of memory")]
    UnterminatedString { addr: u32 },
}

/// Fails unless `addr` is a multiple of `align`.
///
/// Misaligned scalar accesses are a sign that producer and consumer disagree
/// on a layout, so they are reported instead of being silently fixed up.
pub fn check_align(addr: u32, align: u32) -> Result<(), MemoryError> {
    debug_assert!(align.is_power_of_two());
    if addr & (align - 1) != 0 {
        return Err(MemoryError::Misaligned { addr, align });
    }
    Ok(())
}

/// Byte-addressable memory with little-endian scalar helpers.
///
/// Implementors only provide raw byte copies; the scalar accessors enforce
/// natural alignment (4 bytes for `u32`/`i32`, 8 bytes for `f64`).
pub trait Memory {
    /// Size of the address space in bytes.
    fn size(&self) -> usize;

    fn read_bytes(&self, addr: u32, dst: &mut [u8]) -> Result<(), MemoryError>;
    fn write_bytes(&mut self, addr: u32, src: &[u8]) -> Result<(), MemoryError>;

    /// Borrow `len` bytes in place.
    ///
    /// Memory that cannot hand out a plain byte slice (for example memory
    /// whose words are shared atomics) returns [`MemoryError::Unaliasable`].
    fn borrow_bytes(&self, addr: u32, len: usize) -> Result<&[u8], MemoryError> {
        Err(MemoryError::Unaliasable { addr, len })
    }

    fn read_u32(&self, addr: u32) -> Result<u32, MemoryError> {
        check_align(addr, 4)?;
        let mut buf = [0u8; 4];
        self.read_bytes(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&self, addr: u32) -> Result<i32, MemoryError> {
        self.read_u32(addr).map(|v| v as i32)
    }

    fn read_f64(&self, addr: u32) -> Result<f64, MemoryError> {
        check_align(addr, 8)?;
        let mut buf = [0u8; 8];
        self.read_bytes(addr, &mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        check_align(addr, 4)?;
        self.write_bytes(addr, &value.to_le_bytes())
    }

    fn write_i32(&mut self, addr: u32, value: i32) -> Result<(), MemoryError> {
        self.write_u32(addr, value as u32)
    }

    fn write_f64(&mut self, addr: u32, value: f64) -> Result<(), MemoryError> {
        check_align(addr, 8)?;
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// Read `count` consecutive `u32` words starting at `addr`.
    fn read_u32_array(&self, addr: u32, count: usize) -> Result<Vec<u32>, MemoryError> {
        check_align(addr, 4)?;
        let len = count
            .checked_mul(4)
            .ok_or(MemoryError::OutOfBounds { addr, len: usize::MAX })?;
        let mut bytes = vec![0u8; len];
        self.read_bytes(addr, &mut bytes)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Read a NUL-terminated string.
    ///
    /// Text is decoded as UTF-8; invalid sequences are replaced rather than
    /// rejected since code-page handling belongs to the embedder.
    fn read_cstr(&self, addr: u32) -> Result<String, MemoryError> {
        let mut bytes = Vec::new();
        let mut cursor = addr;
        let mut chunk = [0u8; 64];
        loop {
            let available = self.size().saturating_sub(cursor as usize);
            if available == 0 {
                return Err(MemoryError::UnterminatedString { addr });
            }
            let n = available.min(chunk.len());
            self.read_bytes(cursor, &mut chunk[..n])?;
            if let Some(nul) = chunk[..n].iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            cursor = cursor.wrapping_add(n as u32);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write `s` followed by a NUL terminator.
    fn write_cstr(&mut self, addr: u32, s: &str) -> Result<(), MemoryError> {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.write_bytes(addr, &bytes)
    }
}

/// Contiguous, thread-local memory backed by a byte vector.
///
/// This is the memory used when native code and the host run on the same
/// thread; it supports zero-copy borrows.
#[derive(Clone, Debug)]
pub struct VecMemory {
    bytes: Vec<u8>,
}

impl VecMemory {
    pub fn new(size_bytes: usize) -> Self {
        Self {
            bytes: vec![0u8; size_bytes],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn range(&self, addr: u32, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let start = addr as usize;
        let end = start
            .checked_add(len)
            .ok_or(MemoryError::OutOfBounds { addr, len })?;
        if end > self.bytes.len() {
            return Err(MemoryError::OutOfBounds { addr, len });
        }
        Ok(start..end)
    }
}

impl Memory for VecMemory {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read_bytes(&self, addr: u32, dst: &mut [u8]) -> Result<(), MemoryError> {
        let range = self.range(addr, dst.len())?;
        dst.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write_bytes(&mut self, addr: u32, src: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(addr, src.len())?;
        self.bytes[range].copy_from_slice(src);
        Ok(())
    }

    fn borrow_bytes(&self, addr: u32, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip_little_endian() {
        let mut mem = VecMemory::new(64);
        mem.write_u32(4, 0x1122_3344).unwrap();
        mem.write_f64(8, 1.5).unwrap();
        mem.write_i32(16, -2).unwrap();

        assert_eq!(&mem.as_slice()[4..8], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(mem.read_u32(4).unwrap(), 0x1122_3344);
        assert_eq!(mem.read_f64(8).unwrap(), 1.5);
        assert_eq!(mem.read_i32(16).unwrap(), -2);
    }

    #[test]
    fn misaligned_scalar_access_is_rejected() {
        let mut mem = VecMemory::new(64);
        assert_eq!(
            mem.read_u32(2),
            Err(MemoryError::Misaligned { addr: 2, align: 4 })
        );
        assert_eq!(
            mem.read_f64(4),
            Err(MemoryError::Misaligned { addr: 4, align: 8 })
        );
        assert_eq!(
            mem.write_f64(12, 0.0),
            Err(MemoryError::Misaligned { addr: 12, align: 8 })
        );
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let mem = VecMemory::new(16);
        assert_eq!(
            mem.read_u32(16),
            Err(MemoryError::OutOfBounds { addr: 16, len: 4 })
        );
        assert!(mem.borrow_bytes(8, 9).is_err());
        assert_eq!(mem.borrow_bytes(8, 8).unwrap().len(), 8);
    }

    #[test]
    fn cstr_reads_until_nul() {
        let mut mem = VecMemory::new(256);
        mem.write_cstr(100, "hello, world").unwrap();
        assert_eq!(mem.read_cstr(100).unwrap(), "hello, world");
        assert_eq!(mem.read_cstr(107).unwrap(), "world");

        // Long strings span multiple read chunks.
        let long = "x".repeat(150);
        mem.write_cstr(0, &long).unwrap();
        assert_eq!(mem.read_cstr(0).unwrap(), long);
    }

    #[test]
    fn unterminated_cstr_is_an_error() {
        let mut mem = VecMemory::new(8);
        mem.write_bytes(0, b"abcdefgh").unwrap();
        assert_eq!(
            mem.read_cstr(2),
            Err(MemoryError::UnterminatedString { addr: 2 })
        );
    }

    #[test]
    fn u32_array_reads_consecutive_words() {
        let mut mem = VecMemory::new(32);
        for (i, v) in [7u32, 8, 9].iter().enumerate() {
            mem.write_u32(8 + 4 * i as u32, *v).unwrap();
        }
        assert_eq!(mem.read_u32_array(8, 3).unwrap(), vec![7, 8, 9]);
    }
}

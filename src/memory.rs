//! The unified code and data store of the machine.

use std::fmt;

/// Number of addressable bytes.
pub const MEMORY_SIZE: usize = 0x1_0000;

/// Error returned when a block of bytes does not fit into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    /// Address the block was supposed to start at.
    pub origin: u16,
    /// Length of the block.
    pub length: usize,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} bytes do not fit in memory starting at 0x{:04X}", self.length, self.origin)
    }
}

impl std::error::Error for LoadError {}

/// 64 KiB of byte-addressable memory.
///
/// Instructions and data live in the same address space. Every 16-bit address is valid, so reads
/// cannot fail.
#[derive(Clone)]
pub struct Memory {
    inner: Box<[u8]>,
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl Memory {
    /// Creates a zero-filled memory.
    pub fn new() -> Memory {
        Memory {
            inner: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    pub fn read(&self, address: u16) -> u8 {
        self.inner[address as usize]
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.inner[address as usize] = value;
    }

    /// Copies `bytes` into memory starting at `origin`.
    ///
    /// # Returns
    /// The number of bytes written, or a [LoadError] if the block would run past the end of the
    /// address space. Memory is left untouched on error.
    pub fn load(&mut self, origin: u16, bytes: &[u8]) -> Result<usize, LoadError> {
        let start = origin as usize;
        let end = start + bytes.len();

        if end > MEMORY_SIZE {
            return Err(LoadError { origin, length: bytes.len() });
        }

        self.inner[start..end].copy_from_slice(bytes);

        Ok(bytes.len())
    }

    /// Returns `length` bytes starting at `origin`, clamped to the end of memory.
    pub fn slice(&self, origin: u16, length: usize) -> &[u8] {
        let start = origin as usize;
        let end = std::cmp::min(start + length, MEMORY_SIZE);

        &self.inner[start..end]
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let used = self.inner.iter().filter(|byte| **byte != 0).count();
        write!(f, "Memory {{ size: {}, nonzero: {} }}", MEMORY_SIZE, used)
    }
}

#[test]
fn test_load_and_read() {
    let mut memory = Memory::new();

    assert_eq!(memory.load(0x10, &[1, 2, 3]), Ok(3));
    assert_eq!(memory.read(0x0F), 0);
    assert_eq!(memory.read(0x10), 1);
    assert_eq!(memory.slice(0x10, 3), &[1, 2, 3]);
}

#[test]
fn test_load_past_end() {
    let mut memory = Memory::new();

    assert_eq!(memory.load(0xFFFE, &[1, 2]), Ok(2));
    assert_eq!(memory.read(0xFFFF), 2);

    let err = memory.load(0xFFFF, &[9, 9]).unwrap_err();
    assert_eq!(err, LoadError { origin: 0xFFFF, length: 2 });
    assert_eq!(memory.read(0xFFFF), 2);
    assert_eq!(memory.slice(0xFFFF, 16).len(), 1);
}

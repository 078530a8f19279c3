//! RAM-backed NOR flash for host tests.
//!
//! Writes can only clear bits, like real NOR; erase sets a whole sector
//! back to 0xFF.

use embedded_storage_async::nor_flash::{
    ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

pub struct MemFlash {
    base: u32,
    data: std::vec::Vec<u8>,
    erases: usize,
    fail_writes: bool,
}

impl MemFlash {
    pub const SECTOR: usize = 4096;

    /// `size` bytes of erased flash mapped at `base`.
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: std::vec![0xFF; size],
            erases: 0,
            fail_writes: false,
        }
    }

    fn index(&self, offset: u32, len: usize) -> Result<usize, NorFlashErrorKind> {
        let start = offset
            .checked_sub(self.base)
            .ok_or(NorFlashErrorKind::OutOfBounds)? as usize;
        if start + len > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(start)
    }

    pub fn bytes_at(&self, offset: u32, len: usize) -> &[u8] {
        let start = (offset - self.base) as usize;
        &self.data[start..start + len]
    }

    /// Overwrite bytes directly, bypassing NOR semantics.
    pub fn poke(&mut self, offset: u32, bytes: &[u8]) {
        let start = (offset - self.base) as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn erase_count(&self) -> usize {
        self.erases
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl ErrorType for MemFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MemFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = self.index(offset, bytes.len())?;
        bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for MemFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = Self::SECTOR;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(NorFlashErrorKind::Other);
        }
        if (from - self.base) as usize % Self::SECTOR != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let start = self.index(from, (to - from) as usize)?;
        self.data[start..start + (to - from) as usize].fill(0xFF);
        self.erases += 1;
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(NorFlashErrorKind::Other);
        }
        if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let start = self.index(offset, bytes.len())?;
        for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

//! Read-back verification

use super::{DeviceHandle, NoProgress, Progress, ERASED_VALUE};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Read in chunks to avoid allocating the whole range at once
const CHUNK_SIZE: usize = 256;

impl<T: Transport> DeviceHandle<T> {
    /// Compare the device contents at `addr` with `expected`
    ///
    /// Returns the number of matching bytes (the full length) or
    /// [`Error::VerifyMismatch`] with the offset of the first difference,
    /// relative to `addr`.
    pub fn verify_range(&mut self, addr: u32, expected: &[u8]) -> Result<usize> {
        self.verify_range_with(addr, expected, &mut NoProgress)
    }

    /// Compare the device contents with `expected`, reporting progress per chunk
    pub fn verify_range_with(
        &mut self,
        addr: u32,
        expected: &[u8],
        progress: &mut dyn Progress,
    ) -> Result<usize> {
        if !self.params.is_valid_range(addr, expected.len()) {
            return Err(Error::AddressOutOfBounds);
        }

        progress.verifying(expected.len());
        let mut buf = [0u8; CHUNK_SIZE];
        let mut offset = 0usize;
        for want in expected.chunks(CHUNK_SIZE) {
            let have = &mut buf[..want.len()];
            self.read(addr + offset as u32, have)?;

            if let Some(pos) = have.iter().zip(want).position(|(h, w)| h != w) {
                let offset = (offset + pos) as u32;
                log::debug!(
                    "Verify mismatch at 0x{:06X}: expected 0x{:02X}, found 0x{:02X}",
                    addr + offset,
                    want[pos],
                    have[pos]
                );
                return Err(Error::VerifyMismatch { offset });
            }

            offset += want.len();
            progress.verify_progress(offset);
        }

        Ok(expected.len())
    }

    /// Check that `[addr, addr + len)` reads back as erased (all 0xFF)
    pub fn check_erased(&mut self, addr: u32, len: u32) -> Result<()> {
        if !self.params.is_valid_range(addr, len as usize) {
            return Err(Error::AddressOutOfBounds);
        }

        let mut buf = [0u8; CHUNK_SIZE];
        let mut offset = 0u32;
        while offset < len {
            let chunk_len = core::cmp::min(CHUNK_SIZE as u32, len - offset) as usize;
            let chunk = &mut buf[..chunk_len];
            self.read(addr + offset, chunk)?;

            if let Some(pos) = chunk.iter().position(|&b| b != ERASED_VALUE) {
                return Err(Error::VerifyMismatch {
                    offset: offset + pos as u32,
                });
            }
            offset += chunk_len as u32;
        }

        Ok(())
    }
}

//! Page-write splitter

use super::{DeviceHandle, NoProgress, Progress};
use crate::error::{Error, Result};
use crate::protocol;
use crate::transport::Transport;

/// One program command's worth of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChunk {
    /// Device address of the first byte
    pub addr: u32,
    /// Offset of the first byte in the source data
    pub offset: usize,
    /// Number of bytes, never crossing a page boundary
    pub len: usize,
}

/// Iterator over the page-bounded pieces of a write
#[derive(Debug, Clone)]
pub struct PageChunks {
    page_size: usize,
    addr: u32,
    offset: usize,
    remaining: usize,
}

/// Split `[addr, addr + len)` at page boundaries
///
/// The first chunk runs up to the end of the page containing `addr`, the
/// following ones are whole pages and the last one holds what is left.
pub fn page_chunks(page_size: u32, addr: u32, len: usize) -> PageChunks {
    PageChunks {
        page_size: page_size as usize,
        addr,
        offset: 0,
        remaining: len,
    }
}

impl Iterator for PageChunks {
    type Item = PageChunk;

    fn next(&mut self) -> Option<PageChunk> {
        if self.remaining == 0 || self.page_size == 0 {
            return None;
        }

        // Calculate how many bytes until the next page boundary
        let page_offset = (self.addr as usize) % self.page_size;
        let bytes_to_page_end = self.page_size - page_offset;
        let len = core::cmp::min(bytes_to_page_end, self.remaining);

        let chunk = PageChunk {
            addr: self.addr,
            offset: self.offset,
            len,
        };
        self.addr = self.addr.wrapping_add(len as u32);
        self.offset += len;
        self.remaining -= len;
        Some(chunk)
    }
}

impl<T: Transport> DeviceHandle<T> {
    /// Write `data` starting at `addr`
    ///
    /// The target range must be erased first on flash parts. A zero-length
    /// write returns immediately without touching the device.
    pub fn write_range(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.write_range_with(addr, data, &mut NoProgress)
    }

    /// Write `data` starting at `addr`, reporting progress per page
    pub fn write_range_with(
        &mut self,
        addr: u32,
        data: &[u8],
        progress: &mut dyn Progress,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if !self.params.is_valid_range(addr, data.len()) {
            return Err(Error::AddressOutOfBounds);
        }

        log::debug!("Writing {} bytes at 0x{:06X}", data.len(), addr);
        progress.writing(data.len());

        for chunk in page_chunks(self.params.page_size, addr, data.len()) {
            log::trace!("Program 0x{:06X} len {}", chunk.addr, chunk.len);
            protocol::program(
                &mut self.bus,
                self.profile,
                self.params.address_width,
                chunk.addr,
                &data[chunk.offset..chunk.offset + chunk.len],
                self.timeouts.program,
            )?;
            progress.write_progress(chunk.offset + chunk.len);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unaligned_write_splits() {
        let mut chunks = page_chunks(256, 10, 300);
        assert_eq!(
            chunks.next(),
            Some(PageChunk {
                addr: 10,
                offset: 0,
                len: 246
            })
        );
        assert_eq!(
            chunks.next(),
            Some(PageChunk {
                addr: 256,
                offset: 246,
                len: 54
            })
        );
        assert_eq!(chunks.next(), None);
    }

    #[test]
    fn test_single_page_write() {
        let chunks: [Option<PageChunk>; 2] = {
            let mut it = page_chunks(256, 0x100 + 16, 32);
            [it.next(), it.next()]
        };
        assert_eq!(chunks[0].map(|c| c.len), Some(32));
        assert_eq!(chunks[1], None);
    }

    #[test]
    fn test_aligned_full_pages() {
        let mut count = 0;
        for chunk in page_chunks(64, 128, 64 * 3) {
            assert_eq!(chunk.addr % 64, 0);
            assert_eq!(chunk.len, 64);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_chunks_never_cross_pages() {
        for addr in [0u32, 1, 63, 64, 100, 255, 256, 1000] {
            for len in [1usize, 2, 63, 64, 65, 300, 1024] {
                let mut total = 0;
                let mut first = true;
                for chunk in page_chunks(64, addr, len) {
                    let start_page = chunk.addr / 64;
                    let end_page = (chunk.addr + chunk.len as u32 - 1) / 64;
                    assert_eq!(start_page, end_page);
                    if first {
                        let expected = core::cmp::min(64 - (addr as usize % 64), len);
                        assert_eq!(chunk.len, expected);
                        first = false;
                    }
                    assert_eq!(chunk.offset, total);
                    total += chunk.len;
                }
                assert_eq!(total, len);
            }
        }
    }

    #[test]
    fn test_zero_length_yields_nothing() {
        assert_eq!(page_chunks(256, 10, 0).next(), None);
    }
}

//! SPI command structure

use super::AddressWidth;
use crate::error::{Error, Result};

/// Largest opcode + address + dummy header any supported command needs
pub const MAX_HEADER_LEN: usize = 5;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Number of dummy bytes after address
    pub dummy_bytes: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create an addressed read command (e.g., READ)
    pub fn read(opcode: u8, width: AddressWidth, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create an addressed write command (e.g., PP)
    pub fn write(opcode: u8, width: AddressWidth, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            dummy_bytes: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an addressed erase command
    pub fn erase(opcode: u8, width: AddressWidth, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            dummy_bytes: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Set the number of dummy bytes
    pub fn with_dummy_bytes(mut self, bytes: u8) -> Self {
        self.dummy_bytes = bytes;
        self
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Number of header bytes (opcode + address + dummy)
    pub fn header_len(&self) -> usize {
        1 + self.address_width.bytes() as usize + self.dummy_bytes as usize
    }

    /// Calculate the total number of bytes clocked for this command
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }

    /// Check that the address phase is consistent and in range
    pub fn check(&self) -> Result<()> {
        match (self.address, self.address_width) {
            (None, AddressWidth::None) => {}
            (Some(_), AddressWidth::None) | (None, _) => return Err(Error::InvalidCommand),
            (Some(addr), width) => {
                if !width.fits(addr) {
                    return Err(Error::AddressOutOfBounds);
                }
            }
        }
        if self.header_len() > MAX_HEADER_LEN {
            return Err(Error::InvalidCommand);
        }
        Ok(())
    }

    /// Encode opcode, address and dummy bytes into `buf`
    ///
    /// Returns the number of bytes written. `buf` must hold at least
    /// `header_len()` bytes.
    pub fn encode_header(&self, buf: &mut [u8]) -> usize {
        buf[0] = self.opcode;
        let mut len = 1;
        if let Some(addr) = self.address {
            let width = self.address_width.bytes() as usize;
            self.address_width.encode(addr, &mut buf[1..1 + width]);
            len += width;
        }
        for byte in &mut buf[len..len + self.dummy_bytes as usize] {
            *byte = 0;
        }
        len + self.dummy_bytes as usize
    }
}

//! Transport trait definitions

use core::ops::{Deref, DerefMut};

use crate::error::Result;

/// Byte-level SPI channel to a single memory device
///
/// Implementations only move bytes and drive the device-select line; they
/// know nothing about opcodes or addressing. A transaction is everything
/// exchanged between one `assert_select` and the matching `release_select`.
pub trait Transport {
    /// Drive the device-select line active, starting a transaction
    fn assert_select(&mut self) -> Result<()>;

    /// Drive the device-select line inactive, ending the transaction
    fn release_select(&mut self);

    /// Clock out `data`, discarding the bytes clocked in
    ///
    /// Returns the number of bytes transferred.
    fn transfer_bytes(&mut self, data: &[u8]) -> Result<usize>;

    /// Clock out one byte and return the byte clocked in
    fn transfer_byte(&mut self, out: u8) -> Result<u8>;

    /// Fill `buf` with bytes clocked in while sending zeros
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        for byte in buf.iter_mut() {
            *byte = self.transfer_byte(0)?;
        }
        Ok(())
    }

    /// Busy-wait for the given number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn assert_select(&mut self) -> Result<()> {
        (**self).assert_select()
    }

    fn release_select(&mut self) {
        (**self).release_select()
    }

    fn transfer_bytes(&mut self, data: &[u8]) -> Result<usize> {
        (**self).transfer_bytes(data)
    }

    fn transfer_byte(&mut self, out: u8) -> Result<u8> {
        (**self).transfer_byte(out)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_bytes(buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

#[cfg(feature = "alloc")]
impl<T: Transport + ?Sized> Transport for alloc::boxed::Box<T> {
    fn assert_select(&mut self) -> Result<()> {
        (**self).assert_select()
    }

    fn release_select(&mut self) {
        (**self).release_select()
    }

    fn transfer_bytes(&mut self, data: &[u8]) -> Result<usize> {
        (**self).transfer_bytes(data)
    }

    fn transfer_byte(&mut self, out: u8) -> Result<u8> {
        (**self).transfer_byte(out)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_bytes(buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Device-select held for the lifetime of the guard
///
/// The line is asserted when the guard is created and released when it is
/// dropped, so a transaction is closed on every return path.
pub struct SelectGuard<'a, T: Transport + ?Sized> {
    bus: &'a mut T,
}

impl<'a, T: Transport + ?Sized> SelectGuard<'a, T> {
    /// Assert device-select on `bus`
    pub fn new(bus: &'a mut T) -> Result<Self> {
        bus.assert_select()?;
        Ok(Self { bus })
    }
}

impl<T: Transport + ?Sized> Deref for SelectGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.bus
    }
}

impl<T: Transport + ?Sized> DerefMut for SelectGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.bus
    }
}

impl<T: Transport + ?Sized> Drop for SelectGuard<'_, T> {
    fn drop(&mut self) {
        self.bus.release_select();
    }
}

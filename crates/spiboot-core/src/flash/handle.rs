//! Device handle - an open transport bound to its memory geometry

use crate::error::{Error, Result};
use crate::memory::{self, CommandProfile, KnownPart, MemoryParams};
use crate::protocol::{self, Status, Timeouts};
use crate::transport::Transport;

/// Options for opening a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Geometry to use; `None` identifies the part on the bus
    pub params: Option<MemoryParams>,
    /// Status-poll budgets
    pub timeouts: Timeouts,
    /// Use fast read where the profile has it
    pub fast_read: bool,
    /// Clear block protection bits when opening
    pub unprotect: bool,
}

impl DeviceConfig {
    /// Configuration with fixed geometry
    pub fn with_params(params: MemoryParams) -> Self {
        Self {
            params: Some(params),
            ..Default::default()
        }
    }
}

/// An open memory device
///
/// Owns the transport for the whole session. Geometry and command profile
/// are fixed at open time.
pub struct DeviceHandle<T: Transport> {
    pub(super) bus: T,
    pub(super) params: MemoryParams,
    pub(super) profile: CommandProfile,
    pub(super) timeouts: Timeouts,
    fast_read: bool,
    part: Option<&'static KnownPart>,
}

impl<T: Transport> DeviceHandle<T> {
    /// Open a device on `bus`
    ///
    /// Supplied geometry is validated; otherwise the part is identified on
    /// the bus.
    pub fn open(mut bus: T, config: &DeviceConfig) -> Result<Self> {
        let (params, part) = match config.params {
            Some(params) => {
                params.validate()?;
                (params, None)
            }
            None => memory::detect(&mut bus)?,
        };
        let profile = CommandProfile::for_class(params.class);

        match part {
            Some(part) => log::info!(
                "Found {} {} ({} KiB)",
                part.vendor,
                part.name,
                params.capacity / 1024
            ),
            None => log::info!(
                "Using {} geometry ({} KiB, {}-bit address)",
                params.class.name(),
                params.capacity / 1024,
                params.address_width.bits()
            ),
        }

        let mut handle = Self {
            bus,
            params,
            profile,
            timeouts: config.timeouts,
            fast_read: config.fast_read,
            part,
        };

        if config.unprotect {
            handle.unprotect()?;
        }

        Ok(handle)
    }

    /// Geometry of the device
    pub fn params(&self) -> &MemoryParams {
        &self.params
    }

    /// Command profile selected at open time
    pub fn profile(&self) -> CommandProfile {
        self.profile
    }

    /// Status-poll budgets
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// The identified part, if it was found in the part table
    pub fn part(&self) -> Option<&'static KnownPart> {
        self.part
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.params.capacity
    }

    /// Access the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    /// Read the status register
    pub fn status(&mut self) -> Result<Status> {
        protocol::read_status(&mut self.bus, self.profile)
    }

    /// Clear the block protect bits if any are set
    pub fn unprotect(&mut self) -> Result<()> {
        let status = self.status()?;
        if !status.is_protected() {
            return Ok(());
        }

        log::info!("Clearing block protection (status 0x{:02X})", status.bits());
        let value = status.difference(Status::BP | Status::WIP | Status::WEL);
        if let Err(e) = protocol::write_status(
            &mut self.bus,
            self.profile,
            value.bits(),
            self.timeouts.write_status,
        ) {
            // Leave the write latch cleared
            if let Err(wrdi) = protocol::write_disable(&mut self.bus, self.profile) {
                log::debug!("Write disable after failed status write: {}", wrdi);
            }
            return Err(e);
        }

        let status = self.status()?;
        if status.is_protected() {
            log::warn!(
                "Block protection still set (status 0x{:02X}), writes may fail",
                status.bits()
            );
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `addr`
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if !self.params.is_valid_range(addr, buf.len()) {
            return Err(Error::AddressOutOfBounds);
        }

        protocol::read(
            &mut self.bus,
            self.profile,
            self.params.address_width,
            addr,
            buf,
            self.fast_read,
        )
    }
}

//! Memory geometry descriptor

use crate::error::{Error, Result};
use crate::spi::AddressWidth;

/// Family of a memory part, selecting its command profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// 25-series serial EEPROM (byte-writable, no erase commands)
    Eeprom,
    /// 25-series NOR flash
    NorFlash,
    /// Atmel AT25F flash with its own erase and ID opcodes
    AtmelFlash,
}

impl DeviceClass {
    /// Human-readable class name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Eeprom => "EEPROM",
            Self::NorFlash => "NOR flash",
            Self::AtmelFlash => "Atmel flash",
        }
    }
}

/// Geometry of a memory part
///
/// Sizes are in bytes. A valid descriptor satisfies
/// `page <= sector <= block <= capacity`, with each size a multiple of the
/// one below it and the capacity reachable with the address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryParams {
    /// Device family
    pub class: DeviceClass,
    /// Address width used on the wire
    pub address_width: AddressWidth,
    /// Largest unit a single program command may write
    pub page_size: u32,
    /// Smallest erase unit
    pub sector_size: u32,
    /// Large erase unit
    pub block_size: u32,
    /// Total capacity
    pub capacity: u32,
}

impl MemoryParams {
    /// Default geometry for a 25-series NOR flash when nothing better is known
    pub const NOR_DEFAULT: Self = Self {
        class: DeviceClass::NorFlash,
        address_width: AddressWidth::ThreeByte,
        page_size: 256,
        sector_size: 4 * 1024,
        block_size: 64 * 1024,
        capacity: 512 * 1024,
    };

    /// Default geometry for a 16-bit addressed 25-series EEPROM
    pub const EEPROM_DEFAULT: Self = Self {
        class: DeviceClass::Eeprom,
        address_width: AddressWidth::TwoByte,
        page_size: 64,
        sector_size: 64,
        block_size: 64,
        capacity: 32 * 1024,
    };

    /// Default geometry for the given class
    pub const fn default_for(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Eeprom => Self::EEPROM_DEFAULT,
            DeviceClass::NorFlash => Self::NOR_DEFAULT,
            DeviceClass::AtmelFlash => Self {
                class: DeviceClass::AtmelFlash,
                address_width: AddressWidth::ThreeByte,
                page_size: 128,
                sector_size: 32 * 1024,
                block_size: 32 * 1024,
                capacity: 64 * 1024,
            },
        }
    }

    /// Check the geometry invariants
    pub fn validate(&self) -> Result<()> {
        let sizes = [self.page_size, self.sector_size, self.block_size, self.capacity];
        if sizes.contains(&0) || self.address_width == AddressWidth::None {
            return Err(Error::InvalidParams);
        }
        if !(self.page_size <= self.sector_size
            && self.sector_size <= self.block_size
            && self.block_size <= self.capacity)
        {
            return Err(Error::InvalidParams);
        }
        if self.sector_size % self.page_size != 0
            || self.block_size % self.sector_size != 0
            || self.capacity % self.block_size != 0
        {
            return Err(Error::InvalidParams);
        }
        if self.capacity > self.address_width.max_size() {
            return Err(Error::InvalidParams);
        }
        Ok(())
    }

    /// Check if an address range is within the device
    pub fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        let Ok(len) = u32::try_from(len) else {
            return false;
        };
        match addr.checked_add(len) {
            Some(end) => end <= self.capacity,
            None => false,
        }
    }

    /// Round `addr` down to a sector boundary
    pub const fn sector_floor(&self, addr: u32) -> u32 {
        addr - addr % self.sector_size
    }

    /// Round `addr` up to a sector boundary, saturating at the capacity
    pub fn sector_ceil(&self, addr: u32) -> u32 {
        match addr % self.sector_size {
            0 => addr,
            rem => (addr - rem).saturating_add(self.sector_size).min(self.capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        for class in [DeviceClass::Eeprom, DeviceClass::NorFlash, DeviceClass::AtmelFlash] {
            let params = MemoryParams::default_for(class);
            assert_eq!(params.class, class);
            assert!(params.validate().is_ok(), "{:?}", class);
        }
    }

    #[test]
    fn test_validate_ordering() {
        let params = MemoryParams {
            sector_size: 128,
            ..MemoryParams::NOR_DEFAULT
        };
        assert_eq!(params.validate(), Err(Error::InvalidParams));

        let params = MemoryParams {
            capacity: 512 * 1024 + 4096,
            ..MemoryParams::NOR_DEFAULT
        };
        assert_eq!(params.validate(), Err(Error::InvalidParams));
    }

    #[test]
    fn test_validate_address_width() {
        let params = MemoryParams {
            address_width: AddressWidth::TwoByte,
            ..MemoryParams::NOR_DEFAULT
        };
        assert_eq!(params.validate(), Err(Error::InvalidParams));
    }

    #[test]
    fn test_is_valid_range() {
        let params = MemoryParams::NOR_DEFAULT;
        assert!(params.is_valid_range(0, 512 * 1024));
        assert!(params.is_valid_range(512 * 1024, 0));
        assert!(!params.is_valid_range(1, 512 * 1024));
        assert!(!params.is_valid_range(u32::MAX, 2));
    }

    #[test]
    fn test_sector_rounding() {
        let params = MemoryParams::NOR_DEFAULT;
        assert_eq!(params.sector_floor(4097), 4096);
        assert_eq!(params.sector_ceil(4097), 8192);
        assert_eq!(params.sector_ceil(8192), 8192);
        assert_eq!(params.sector_ceil(512 * 1024 - 1), 512 * 1024);
    }
}

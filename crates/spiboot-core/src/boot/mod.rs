//! Boot header validation, image loading and image programming
//!
//! A boot medium holds a 24-byte [`BootHeader`] at a fixed offset, followed
//! (one header span later) by the image it describes. The [`BootLoader`]
//! reads and checks the header, then copies the image into a RAM region.
//! [`program_image`] writes the same layout for the flashing utility.

mod header;
mod image;
mod loader;

pub use header::{
    header_span, BootHeader, ImageKind, ReadOptions, HEADER_LEN, MAGIC_MASK, MAGIC_SENTINEL,
};
pub use image::{program_image, program_image_with, ImageSpec};
pub use loader::{load_image, read_header, BootImage, BootLoader, LoadRegion, LoaderState};

use crate::memory::DeviceClass;

/// Where headers live on the medium and where images may be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootLayout {
    /// Offset of the first-stage (UBL) header
    pub ubl_header_offset: u32,
    /// Offset of the application header
    pub app_header_offset: u32,
    /// First byte of RAM images may target
    pub ram_start: u32,
    /// One past the last byte of RAM images may target
    pub ram_end: u32,
    /// Address used when a requested entry or load address is outside RAM
    pub default_app_address: u32,
}

impl BootLayout {
    /// Default layout for a device class
    pub const fn for_class(class: DeviceClass) -> Self {
        let app_header_offset = match class {
            DeviceClass::Eeprom => 0x4000,
            DeviceClass::NorFlash | DeviceClass::AtmelFlash => 0x8000,
        };
        Self {
            ubl_header_offset: 0,
            app_header_offset,
            ram_start: 0x8000_0000,
            ram_end: 0x9000_0000,
            default_app_address: 0x8108_0000,
        }
    }

    /// Returns true if `addr` lies in the RAM window
    pub const fn in_ram(&self, addr: u32) -> bool {
        addr >= self.ram_start && addr < self.ram_end
    }

    /// `addr` if it lies in RAM, the default application address otherwise
    pub fn app_address_or_default(&self, addr: u32) -> u32 {
        if self.in_ram(addr) {
            addr
        } else {
            log::warn!(
                "Address 0x{:08X} is outside RAM, using 0x{:08X}",
                addr,
                self.default_app_address
            );
            self.default_app_address
        }
    }
}

impl Default for BootLayout {
    fn default() -> Self {
        Self::for_class(DeviceClass::NorFlash)
    }
}

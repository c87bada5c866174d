//! Static part table and device identification

use super::{CommandProfile, DeviceClass, MemoryParams, Operation};
use crate::error::{Error, Result};
use crate::protocol;
use crate::spi::AddressWidth;
use crate::transport::Transport;

/// A memory part known by its identification bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownPart {
    /// Vendor name
    pub vendor: &'static str,
    /// Part name
    pub name: &'static str,
    /// Identification bytes as returned by the class's read-id command
    pub id: &'static [u8],
    /// Geometry
    pub params: MemoryParams,
}

const fn nor(capacity: u32) -> MemoryParams {
    MemoryParams {
        capacity,
        ..MemoryParams::NOR_DEFAULT
    }
}

const fn at25f(page_size: u32, capacity: u32) -> MemoryParams {
    MemoryParams {
        class: DeviceClass::AtmelFlash,
        address_width: AddressWidth::ThreeByte,
        page_size,
        sector_size: 32 * 1024,
        block_size: 32 * 1024,
        capacity,
    }
}

/// Parts recognised by [`detect`]
pub static KNOWN_PARTS: &[KnownPart] = &[
    KnownPart {
        vendor: "Winbond",
        name: "W25X40",
        id: &[0xEF, 0x30, 0x13],
        params: nor(512 * 1024),
    },
    KnownPart {
        vendor: "Winbond",
        name: "W25Q32",
        id: &[0xEF, 0x40, 0x16],
        params: nor(4 * 1024 * 1024),
    },
    KnownPart {
        vendor: "Winbond",
        name: "W25Q64",
        id: &[0xEF, 0x40, 0x17],
        params: nor(8 * 1024 * 1024),
    },
    KnownPart {
        vendor: "Macronix",
        name: "MX25L8005",
        id: &[0xC2, 0x20, 0x14],
        params: nor(1024 * 1024),
    },
    KnownPart {
        vendor: "Atmel",
        name: "AT26DF081A",
        id: &[0x1F, 0x45, 0x01],
        params: nor(1024 * 1024),
    },
    KnownPart {
        vendor: "Atmel",
        name: "AT25F512",
        id: &[0x1F, 0x65],
        params: at25f(128, 64 * 1024),
    },
    KnownPart {
        vendor: "Atmel",
        name: "AT25F1024",
        id: &[0x1F, 0x60],
        params: at25f(256, 128 * 1024),
    },
];

/// Atmel manufacturer code
const ATMEL_MANUFACTURER: u8 = 0x1F;

/// Look up a part of the given class by its identification bytes
pub fn find_by_id(class: DeviceClass, id: &[u8]) -> Option<&'static KnownPart> {
    KNOWN_PARTS
        .iter()
        .find(|part| part.params.class == class && part.id == id)
}

/// A bus with nothing attached reads back all ones (or all zeros when pulled down)
fn is_floating(id: &[u8]) -> bool {
    id.iter().all(|&b| b == 0xFF) || id.iter().all(|&b| b == 0x00)
}

/// Geometry for an unlisted JEDEC part, sized from its capacity code
fn jedec_fallback(id: &[u8; 3]) -> MemoryParams {
    let code = id[2];
    // Standard geometry needs at least one 64 KiB block and a 24-bit address
    if (16..=24).contains(&code) {
        nor(1 << code)
    } else {
        MemoryParams::NOR_DEFAULT
    }
}

/// Identify the attached part
///
/// Tries the JEDEC read-id command, then the Atmel AT25F read-id command,
/// and finally reads the status register to tell an EEPROM (which has no
/// identification command) from an empty bus.
pub fn detect<T: Transport + ?Sized>(
    bus: &mut T,
) -> Result<(MemoryParams, Option<&'static KnownPart>)> {
    let mut jedec = [0u8; 3];
    protocol::read_id(bus, CommandProfile::NorFlash, &mut jedec)?;
    if !is_floating(&jedec) {
        log::debug!(
            "JEDEC ID {:02X} {:02X} {:02X}",
            jedec[0],
            jedec[1],
            jedec[2]
        );
        return Ok(match find_by_id(DeviceClass::NorFlash, &jedec) {
            Some(part) => (part.params, Some(part)),
            None => {
                log::warn!(
                    "Unknown JEDEC ID {:02X} {:02X} {:02X}, assuming standard NOR geometry",
                    jedec[0],
                    jedec[1],
                    jedec[2]
                );
                (jedec_fallback(&jedec), None)
            }
        });
    }

    let mut atmel = [0u8; 2];
    protocol::read_id(bus, CommandProfile::AtmelFlash, &mut atmel)?;
    if !is_floating(&atmel) {
        log::debug!("Atmel ID {:02X} {:02X}", atmel[0], atmel[1]);
        if let Some(part) = find_by_id(DeviceClass::AtmelFlash, &atmel) {
            return Ok((part.params, Some(part)));
        }
        if atmel[0] == ATMEL_MANUFACTURER {
            log::warn!("Unknown Atmel part {:02X}, assuming AT25F512 geometry", atmel[1]);
            return Ok((MemoryParams::default_for(DeviceClass::AtmelFlash), None));
        }
    }

    let status = protocol::read_status(bus, CommandProfile::Eeprom)?;
    if status.bits() != 0xFF {
        log::debug!("No ID but status 0x{:02X}, assuming EEPROM", status.bits());
        return Ok((MemoryParams::EEPROM_DEFAULT, None));
    }

    Err(Error::DeviceNotDetected)
}

/// Returns true if the class can be identified by a read-id command
pub const fn has_id(class: DeviceClass) -> bool {
    CommandProfile::for_class(class).supports(Operation::ReadId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_parts_are_valid() {
        for part in KNOWN_PARTS {
            assert!(part.params.validate().is_ok(), "{}", part.name);
            assert!(has_id(part.params.class), "{}", part.name);
            assert_eq!(
                part.id.len(),
                CommandProfile::for_class(part.params.class).opcodes().id_len as usize
            );
        }
    }

    #[test]
    fn test_find_by_id() {
        let part = find_by_id(DeviceClass::NorFlash, &[0xEF, 0x30, 0x13]).unwrap();
        assert_eq!(part.name, "W25X40");
        assert_eq!(part.params.capacity, 512 * 1024);

        let part = find_by_id(DeviceClass::AtmelFlash, &[0x1F, 0x65]).unwrap();
        assert_eq!(part.name, "AT25F512");
        assert_eq!(part.params.page_size, 128);

        assert!(find_by_id(DeviceClass::NorFlash, &[0x1F, 0x65]).is_none());
    }

    #[test]
    fn test_jedec_fallback() {
        assert_eq!(jedec_fallback(&[0x20, 0x20, 0x15]).capacity, 2 * 1024 * 1024);
        assert_eq!(jedec_fallback(&[0x20, 0x20, 0x05]), MemoryParams::NOR_DEFAULT);
        assert!(!has_id(DeviceClass::Eeprom));
    }

    #[test]
    fn test_is_floating() {
        assert!(is_floating(&[0xFF, 0xFF, 0xFF]));
        assert!(is_floating(&[0x00, 0x00]));
        assert!(!is_floating(&[0xEF, 0x30, 0x13]));
    }
}

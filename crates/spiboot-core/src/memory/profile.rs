//! Per-class command profiles
//!
//! Each device class carries a fixed opcode set. The profile is chosen once
//! when a device is opened and never changes afterwards.

use super::DeviceClass;
use crate::spi::opcodes;

/// Logical operation a device may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Plain read
    Read,
    /// Read with a dummy byte after the address
    FastRead,
    /// Program up to one page
    Program,
    /// Set the write-enable latch
    WriteEnable,
    /// Clear the write-enable latch
    WriteDisable,
    /// Read the status register
    ReadStatus,
    /// Write the status register
    WriteStatus,
    /// Erase one sector
    EraseSector,
    /// Erase one block
    EraseBlock,
    /// Erase the whole device
    EraseChip,
    /// Read identification bytes
    ReadId,
}

impl Operation {
    /// Returns true if the operation carries an address phase
    pub const fn is_addressed(&self) -> bool {
        matches!(
            self,
            Self::Read | Self::FastRead | Self::Program | Self::EraseSector | Self::EraseBlock
        )
    }

    /// Returns true if the operation needs the write-enable latch and a
    /// completion poll
    pub const fn needs_latch(&self) -> bool {
        matches!(
            self,
            Self::Program
                | Self::WriteStatus
                | Self::EraseSector
                | Self::EraseBlock
                | Self::EraseChip
        )
    }
}

/// Opcodes used by one device class
///
/// `None` marks an operation the class does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeSet {
    /// Plain read
    pub read: u8,
    /// Fast read
    pub fast_read: Option<u8>,
    /// Page program
    pub program: u8,
    /// Write enable
    pub write_enable: u8,
    /// Write disable
    pub write_disable: u8,
    /// Read status register
    pub read_status: u8,
    /// Write status register
    pub write_status: u8,
    /// Sector erase
    pub erase_sector: Option<u8>,
    /// Block erase
    pub erase_block: Option<u8>,
    /// Chip erase
    pub erase_chip: Option<u8>,
    /// Identification
    pub read_id: Option<u8>,
    /// Number of identification bytes returned
    pub id_len: u8,
}

const EEPROM_OPCODES: OpcodeSet = OpcodeSet {
    read: opcodes::READ,
    fast_read: None,
    program: opcodes::PP,
    write_enable: opcodes::WREN,
    write_disable: opcodes::WRDI,
    read_status: opcodes::RDSR,
    write_status: opcodes::WRSR,
    erase_sector: None,
    erase_block: None,
    erase_chip: None,
    read_id: None,
    id_len: 0,
};

const NOR_FLASH_OPCODES: OpcodeSet = OpcodeSet {
    read: opcodes::READ,
    fast_read: Some(opcodes::FAST_READ),
    program: opcodes::PP,
    write_enable: opcodes::WREN,
    write_disable: opcodes::WRDI,
    read_status: opcodes::RDSR,
    write_status: opcodes::WRSR,
    erase_sector: Some(opcodes::SE_20),
    erase_block: Some(opcodes::BE_D8),
    erase_chip: Some(opcodes::CE_C7),
    read_id: Some(opcodes::RDID),
    id_len: 3,
};

const ATMEL_FLASH_OPCODES: OpcodeSet = OpcodeSet {
    read: opcodes::READ,
    fast_read: None,
    program: opcodes::PP,
    write_enable: opcodes::WREN,
    write_disable: opcodes::WRDI,
    read_status: opcodes::RDSR,
    write_status: opcodes::WRSR,
    erase_sector: Some(opcodes::SE_52),
    erase_block: None,
    erase_chip: Some(opcodes::CE_62),
    read_id: Some(opcodes::RDID_ATMEL),
    id_len: 2,
};

/// Command profile, one variant per device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandProfile {
    /// 25-series EEPROM
    Eeprom,
    /// 25-series NOR flash
    NorFlash,
    /// Atmel AT25F flash
    AtmelFlash,
}

impl CommandProfile {
    /// Select the profile for a device class
    pub const fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Eeprom => Self::Eeprom,
            DeviceClass::NorFlash => Self::NorFlash,
            DeviceClass::AtmelFlash => Self::AtmelFlash,
        }
    }

    /// The opcode table for this profile
    pub const fn opcodes(&self) -> &'static OpcodeSet {
        match self {
            Self::Eeprom => &EEPROM_OPCODES,
            Self::NorFlash => &NOR_FLASH_OPCODES,
            Self::AtmelFlash => &ATMEL_FLASH_OPCODES,
        }
    }

    /// Opcode for `op`, or `None` if the profile lacks it
    pub const fn opcode(&self, op: Operation) -> Option<u8> {
        let set = self.opcodes();
        match op {
            Operation::Read => Some(set.read),
            Operation::FastRead => set.fast_read,
            Operation::Program => Some(set.program),
            Operation::WriteEnable => Some(set.write_enable),
            Operation::WriteDisable => Some(set.write_disable),
            Operation::ReadStatus => Some(set.read_status),
            Operation::WriteStatus => Some(set.write_status),
            Operation::EraseSector => set.erase_sector,
            Operation::EraseBlock => set.erase_block,
            Operation::EraseChip => set.erase_chip,
            Operation::ReadId => set.read_id,
        }
    }

    /// Returns true if the profile implements `op`
    pub const fn supports(&self, op: Operation) -> bool {
        self.opcode(op).is_some()
    }

    /// Dummy bytes clocked between the address and the data phase
    pub const fn dummy_bytes(&self, op: Operation) -> u8 {
        match op {
            Operation::FastRead => 1,
            _ => 0,
        }
    }

    /// Map an opcode back to the operation it encodes in this profile
    pub fn decode(&self, opcode: u8) -> Option<Operation> {
        const ALL: [Operation; 11] = [
            Operation::Read,
            Operation::FastRead,
            Operation::Program,
            Operation::WriteEnable,
            Operation::WriteDisable,
            Operation::ReadStatus,
            Operation::WriteStatus,
            Operation::EraseSector,
            Operation::EraseBlock,
            Operation::EraseChip,
            Operation::ReadId,
        ];
        ALL.into_iter().find(|op| self.opcode(*op) == Some(opcode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_class() {
        assert_eq!(
            CommandProfile::for_class(DeviceClass::AtmelFlash),
            CommandProfile::AtmelFlash
        );
    }

    #[test]
    fn test_eeprom_has_no_erase() {
        let profile = CommandProfile::Eeprom;
        assert!(!profile.supports(Operation::EraseSector));
        assert!(!profile.supports(Operation::EraseBlock));
        assert!(!profile.supports(Operation::EraseChip));
        assert!(!profile.supports(Operation::ReadId));
        assert_eq!(profile.opcode(Operation::Program), Some(0x02));
    }

    #[test]
    fn test_atmel_opcodes_differ() {
        let profile = CommandProfile::AtmelFlash;
        assert_eq!(profile.opcode(Operation::EraseSector), Some(0x52));
        assert_eq!(profile.opcode(Operation::EraseChip), Some(0x62));
        assert_eq!(profile.opcode(Operation::ReadId), Some(0x15));
        assert!(!profile.supports(Operation::EraseBlock));
    }

    #[test]
    fn test_decode() {
        let profile = CommandProfile::NorFlash;
        assert_eq!(profile.decode(0xD8), Some(Operation::EraseBlock));
        assert_eq!(profile.decode(0x0B), Some(Operation::FastRead));
        assert_eq!(profile.decode(0x62), None);
        assert_eq!(CommandProfile::AtmelFlash.decode(0x62), Some(Operation::EraseChip));
    }

    #[test]
    fn test_operation_kinds() {
        assert!(Operation::Program.is_addressed());
        assert!(!Operation::EraseChip.is_addressed());
        assert!(Operation::EraseChip.needs_latch());
        assert!(!Operation::Read.needs_latch());
    }
}

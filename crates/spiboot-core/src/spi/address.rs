//! Address width types

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 2-byte (16-bit) address - small EEPROMs, up to 64 KiB
    TwoByte,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
}

impl AddressWidth {
    /// Width for a bit count as found in part descriptions (16 or 24)
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            16 => Some(Self::TwoByte),
            24 => Some(Self::ThreeByte),
            _ => None,
        }
    }

    /// Returns the address width in bits
    pub const fn bits(&self) -> u8 {
        self.bytes() * 8
    }

    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::TwoByte => 2,
            Self::ThreeByte => 3,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::TwoByte => 64 * 1024,          // 64 KiB
            Self::ThreeByte => 16 * 1024 * 1024, // 16 MiB
        }
    }

    /// Returns true if `address` can be expressed in this width
    pub const fn fits(&self, address: u32) -> bool {
        address < self.max_size()
    }

    /// Encode an address into bytes, most significant first
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        match self {
            Self::None => {}
            Self::TwoByte => {
                buf[0] = (address >> 8) as u8;
                buf[1] = address as u8;
            }
            Self::ThreeByte => {
                buf[0] = (address >> 16) as u8;
                buf[1] = (address >> 8) as u8;
                buf[2] = address as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let mut buf = [0u8; 3];
        AddressWidth::ThreeByte.encode(0x12_3456, &mut buf);
        assert_eq!(buf, [0x12, 0x34, 0x56]);

        let mut buf = [0u8; 2];
        AddressWidth::TwoByte.encode(0xBEEF, &mut buf);
        assert_eq!(buf, [0xBE, 0xEF]);
    }

    #[test]
    fn test_fits() {
        assert!(AddressWidth::TwoByte.fits(0xFFFF));
        assert!(!AddressWidth::TwoByte.fits(0x1_0000));
        assert!(AddressWidth::ThreeByte.fits(0xFF_FFFF));
        assert!(!AddressWidth::ThreeByte.fits(0x100_0000));
        assert!(!AddressWidth::None.fits(0));
    }

    #[test]
    fn test_from_bits() {
        assert_eq!(AddressWidth::from_bits(16), Some(AddressWidth::TwoByte));
        assert_eq!(AddressWidth::from_bits(24), Some(AddressWidth::ThreeByte));
        assert_eq!(AddressWidth::from_bits(32), None);
        assert_eq!(AddressWidth::ThreeByte.bits(), 24);
    }
}

//! Boot header layout and magic tag check

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};
use crate::spi::AddressWidth;

/// Upper 24 bits shared by every trusted magic tag
pub const MAGIC_SENTINEL: u32 = 0xA1AC_ED00;
/// Bits of the magic tag that must equal [`MAGIC_SENTINEL`]
pub const MAGIC_MASK: u32 = 0xFFFF_FF00;
/// Size of the header on the medium
pub const HEADER_LEN: usize = 24;

const _: () = assert!(core::mem::size_of::<BootHeader>() == HEADER_LEN);

/// Image variant carried in the low byte of the magic tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// Image stored on 24-bit addressed media
    Addr24,
    /// Image stored on 16-bit addressed media
    Addr16,
    /// Binary executed in place
    ExecuteInPlace,
    /// Unknown variant; trusted because the sentinel matched
    Other(u8),
}

impl ImageKind {
    /// Variant for the low byte of a magic tag
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            0x00 => Self::Addr24,
            0x01 => Self::Addr16,
            0x66 => Self::ExecuteInPlace,
            other => Self::Other(other),
        }
    }

    /// Low byte of the magic tag
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Addr24 => 0x00,
            Self::Addr16 => 0x01,
            Self::ExecuteInPlace => 0x66,
            Self::Other(tag) => *tag,
        }
    }

    /// Variant matching the address width of the medium
    pub const fn for_width(width: AddressWidth) -> Self {
        match width {
            AddressWidth::TwoByte => Self::Addr16,
            _ => Self::Addr24,
        }
    }

    /// Full magic tag for this variant
    pub const fn magic(&self) -> u32 {
        MAGIC_SENTINEL | self.tag() as u32
    }
}

/// Read options for a first-stage image, packed into the reserved word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// SPI clock prescaler the boot ROM should switch to
    pub prescaler: u8,
    /// Use fast read when loading the image
    pub fast_read: bool,
}

impl ReadOptions {
    /// Pack into the header's reserved word
    pub const fn to_word(&self) -> u32 {
        self.prescaler as u32 | (self.fast_read as u32) << 8
    }

    /// Unpack from the header's reserved word
    pub const fn from_word(word: u32) -> Self {
        Self {
            prescaler: word as u8,
            fast_read: (word >> 8) as u8 != 0,
        }
    }
}

/// Fixed 24-byte boot header, little-endian on the medium
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct BootHeader {
    magic: U32,
    entry_point: U32,
    image_size: U32,
    reserved: U32,
    source_offset: U32,
    load_address: U32,
}

impl BootHeader {
    /// Build a header
    pub fn new(
        magic: u32,
        entry_point: u32,
        image_size: u32,
        reserved: u32,
        source_offset: u32,
        load_address: u32,
    ) -> Self {
        Self {
            magic: U32::new(magic),
            entry_point: U32::new(entry_point),
            image_size: U32::new(image_size),
            reserved: U32::new(reserved),
            source_offset: U32::new(source_offset),
            load_address: U32::new(load_address),
        }
    }

    /// Parse a header from the first [`HEADER_LEN`] bytes of `bytes`
    ///
    /// Nothing is checked; call [`BootHeader::validate`] before trusting any field.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::read_from_prefix(bytes)
            .map(|(header, _)| header)
            .map_err(|_| Error::SizeOverflow)
    }

    /// Serialized form
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Check the magic tag
    ///
    /// Only the upper 24 bits are compared with the sentinel; the low byte
    /// is reported as the image variant.
    pub fn validate(&self) -> Result<ImageKind> {
        let magic = self.magic();
        if magic & MAGIC_MASK != MAGIC_SENTINEL {
            return Err(Error::InvalidImage { magic });
        }
        Ok(ImageKind::from_tag(magic as u8))
    }

    /// Magic tag
    pub fn magic(&self) -> u32 {
        self.magic.get()
    }

    /// Address execution starts at
    pub fn entry_point(&self) -> u32 {
        self.entry_point.get()
    }

    /// Image size in bytes
    pub fn image_size(&self) -> u32 {
        self.image_size.get()
    }

    /// Reserved / variant-specific word
    pub fn reserved(&self) -> u32 {
        self.reserved.get()
    }

    /// First-stage read options stored in the reserved word
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::from_word(self.reserved())
    }

    /// Offset of the image on the medium
    pub fn source_offset(&self) -> u32 {
        self.source_offset.get()
    }

    /// RAM address the image is copied to
    pub fn load_address(&self) -> u32 {
        self.load_address.get()
    }
}

/// Bytes the header occupies on a medium with `page_size` pages
///
/// The header takes whole pages so the image after it starts page-aligned.
pub const fn header_span(page_size: u32) -> u32 {
    let len = HEADER_LEN as u32;
    if page_size == 0 {
        return len;
    }
    len.div_ceil(page_size) * page_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_little_endian() {
        let header = BootHeader::new(0xA1AC_ED00, 0x100, 4096, 0, 512, 0x20);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &[0x00, 0xED, 0xAC, 0xA1]);
        assert_eq!(&bytes[4..8], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &[0x00, 0x10, 0x00, 0x00]);
        assert_eq!(&bytes[16..20], &[0x00, 0x02, 0x00, 0x00]);
        assert_eq!(&bytes[20..24], &[0x20, 0x00, 0x00, 0x00]);

        let parsed = BootHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.entry_point(), 0x100);
        assert_eq!(parsed.image_size(), 4096);
        assert_eq!(parsed.source_offset(), 512);
        assert_eq!(parsed.load_address(), 0x20);
    }

    #[test]
    fn test_parse_short_buffer() {
        assert_eq!(BootHeader::parse(&[0u8; 23]), Err(Error::SizeOverflow));
    }

    #[test]
    fn test_validate_accepts_any_low_byte() {
        let kinds = [
            (0xA1AC_ED00, ImageKind::Addr24),
            (0xA1AC_ED01, ImageKind::Addr16),
            (0xA1AC_ED66, ImageKind::ExecuteInPlace),
            (0xA1AC_ED42, ImageKind::Other(0x42)),
        ];
        for (magic, kind) in kinds {
            let header = BootHeader::new(magic, 0, 0, 0, 0, 0);
            assert_eq!(header.validate(), Ok(kind));
            assert_eq!(kind.magic(), magic);
        }
    }

    #[test]
    fn test_validate_rejects_bad_sentinel() {
        for magic in [0x1234_5678, 0xFFFF_FFFF, 0x0000_0000, 0xA1AC_EE00] {
            let header = BootHeader::new(magic, 0, 0, 0, 0, 0);
            assert_eq!(header.validate(), Err(Error::InvalidImage { magic }));
        }
    }

    #[test]
    fn test_read_options_word() {
        let options = ReadOptions {
            prescaler: 0x31,
            fast_read: true,
        };
        assert_eq!(options.to_word(), 0x0000_0131);
        assert_eq!(ReadOptions::from_word(0x0131), options);
    }

    #[test]
    fn test_header_span() {
        assert_eq!(header_span(256), 256);
        assert_eq!(header_span(64), 64);
        assert_eq!(header_span(16), 32);
        assert_eq!(ImageKind::for_width(AddressWidth::TwoByte), ImageKind::Addr16);
    }
}

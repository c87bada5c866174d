//! Error types for spiboot-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Details about why a transport channel could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    /// Peripheral index is beyond the number of SPI controllers
    InvalidPeripheral {
        /// Requested peripheral index
        index: u8,
        /// Number of controllers available
        count: u8,
    },
    /// Only the master role can drive a memory device
    UnsupportedRole,
    /// Pin mode has no device-select line
    UnsupportedMode,
    /// Character length other than 8 bits
    UnsupportedCharLen(u8),
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// Opening the transport channel failed
    OpenFailure(OpenFailure),
    /// A byte transfer on the channel failed
    TransferFailed,

    // Command errors
    /// Operation is not part of the device's command profile
    OperationNotSupported,
    /// Command is malformed (missing or unexpected address, oversized buffer)
    InvalidCommand,
    /// Address or range lies outside the device
    AddressOutOfBounds,

    // Device errors
    /// Status polling budget exhausted while the device stayed busy
    Timeout,
    /// Read-back data differs from the source
    VerifyMismatch {
        /// Offset of the first differing byte, relative to the verified range
        offset: u32,
    },
    /// No device answered identification or status reads
    DeviceNotDetected,
    /// Memory geometry violates its invariants
    InvalidParams,

    // Image errors
    /// Boot header magic tag failed the trust check
    InvalidImage {
        /// The magic tag that was read
        magic: u32,
    },
    /// Range exceeds the device capacity or the destination region
    SizeOverflow,
    /// Image has no payload bytes
    EmptyImage,
}

impl fmt::Display for OpenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPeripheral { index, count } => {
                write!(f, "SPI peripheral {} does not exist ({} available)", index, count)
            }
            Self::UnsupportedRole => write!(f, "only the master role is supported"),
            Self::UnsupportedMode => write!(f, "pin mode has no device-select line"),
            Self::UnsupportedCharLen(bits) => {
                write!(f, "unsupported character length of {} bits", bits)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailure(failure) => write!(f, "open failed: {}", failure),
            Self::TransferFailed => write!(f, "SPI transfer failed"),
            Self::OperationNotSupported => write!(f, "operation not supported by device"),
            Self::InvalidCommand => write!(f, "invalid SPI command"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::VerifyMismatch { offset } => {
                write!(f, "verify failed: data mismatch at offset 0x{:08X}", offset)
            }
            Self::DeviceNotDetected => write!(f, "no memory device detected"),
            Self::InvalidParams => write!(f, "invalid memory parameters"),
            Self::InvalidImage { magic } => {
                write!(f, "invalid boot image: bad magic 0x{:08X}", magic)
            }
            Self::SizeOverflow => write!(f, "size exceeds available space"),
            Self::EmptyImage => write!(f, "image is empty"),
        }
    }
}

impl From<OpenFailure> for Error {
    fn from(failure: OpenFailure) -> Self {
        Self::OpenFailure(failure)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

//! SPI memory opcodes
//!
//! Opcodes shared by 25-series EEPROMs and NOR flash, plus the handful that
//! differ on Atmel AT25F parts.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register
pub const RDSR: u8 = 0x05;
/// Write Status Register
pub const WRSR: u8 = 0x01;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + 2-byte device ID)
pub const RDID: u8 = 0x9F;
/// Read Manufacturer and Product ID (Atmel AT25F)
pub const RDID_ATMEL: u8 = 0x15;
/// Read Electronic Manufacturer & Device ID (legacy)
pub const REMS: u8 = 0x90;
/// Release from Deep Power Down
pub const RES: u8 = 0xAB;
/// Deep Power Down
pub const DP: u8 = 0xB9;

// ============================================================================
// Read commands
// ============================================================================

/// Read Data
pub const READ: u8 = 0x03;
/// Fast Read (one dummy byte after the address)
pub const FAST_READ: u8 = 0x0B;
/// Dual Output Read (1-1-2)
pub const DOR: u8 = 0x3B;

// ============================================================================
// Program
// ============================================================================

/// Page Program / EEPROM Write
pub const PP: u8 = 0x02;

// ============================================================================
// Erase commands
// ============================================================================

/// 4 KiB Sector Erase
pub const SE_20: u8 = 0x20;
/// Sector Erase (Atmel AT25F)
pub const SE_52: u8 = 0x52;
/// 64 KiB Block Erase
pub const BE_D8: u8 = 0xD8;
/// Chip Erase
pub const CE_C7: u8 = 0xC7;
/// Chip Erase (alternate)
pub const CE_60: u8 = 0x60;
/// Chip Erase (Atmel AT25F)
pub const CE_62: u8 = 0x62;

// ============================================================================
// Status register bits
// ============================================================================

/// Write In Progress
pub const SR_WIP: u8 = 1 << 0;
/// Write Enable Latch
pub const SR_WEL: u8 = 1 << 1;
/// Block Protect bits (BP0-BP2)
pub const SR_BP_MASK: u8 = 0x1C;
/// Status Register Write Disable
pub const SR_SRWD: u8 = 1 << 7;

//! SPI types and command structures
//!
//! This module provides types for representing SPI memory transactions and
//! the opcodes used by the supported device families.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::{SpiCommand, MAX_HEADER_LEN};

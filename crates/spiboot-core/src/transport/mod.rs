//! Byte-level SPI transport
//!
//! A transport is the narrow interface this crate consumes to reach a memory
//! device: open a channel on a controller, frame transactions with the
//! device-select line and exchange raw bytes. Everything above it (command
//! encoding, polling, paging) lives in this crate.

mod config;
mod traits;

pub use config::{PinMode, Role, SpiConfig, TransportConfig};
pub use traits::{SelectGuard, Transport};

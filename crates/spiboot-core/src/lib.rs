//! spiboot-core - Core library for SPI memory access and boot image loading
//!
//! This crate turns a raw byte-level SPI channel into page- and sector-aware
//! read, write and erase operations on EEPROM and NOR flash parts, and
//! implements the boot header validation and image loading sequence on top
//! of it. It is `no_std` compatible so the same code can run in a first-stage
//! loader and in a host-side flashing utility.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`) and TOML
//!   configuration loading
//! - `alloc` - Enable boxed transports
//!
//! # Example
//!
//! ```ignore
//! use spiboot_core::flash::{DeviceConfig, DeviceHandle};
//! use spiboot_core::boot::{BootLoader, LoadRegion};
//!
//! fn boot<T: spiboot_core::transport::Transport>(bus: T, ram: &mut [u8]) {
//!     let mut handle = DeviceHandle::open(bus, &DeviceConfig::default()).unwrap();
//!     let region = LoadRegion::new(0x8000_0000, ram);
//!     match BootLoader::new(&mut handle, 0x8000, region).run() {
//!         Ok(image) => println!("entry point 0x{:08X}", image.entry_point),
//!         Err(e) => println!("boot failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod boot;
#[cfg(feature = "std")]
pub mod config;
pub mod error;
pub mod flash;
pub mod memory;
pub mod protocol;
pub mod spi;
pub mod transport;

pub use error::{Error, Result};

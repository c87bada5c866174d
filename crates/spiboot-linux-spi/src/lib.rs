//! spiboot-linux-spi - Linux spidev transport
//!
//! This crate provides a [`Transport`](spiboot_core::transport::Transport)
//! over the Linux `/dev/spidevX.Y` device interface.
//!
//! # Overview
//!
//! The Linux SPI driver exposes SPI controllers through character devices
//! at `/dev/spidevX.Y` where X is the bus number and Y is the chip select.
//! A peripheral index selects bus X with chip select 0 unless a device path
//! is given explicitly.
//!
//! # Example
//!
//! ```no_run
//! use spiboot_core::flash::{DeviceConfig, DeviceHandle};
//! use spiboot_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0")
//!     .with_speed(4_000_000)  // 4 MHz
//!     .with_mode(0);
//! let spi = LinuxSpi::open(&config)?;
//!
//! let mut device = DeviceHandle::open(spi, &DeviceConfig::default())?;
//! let mut header = [0u8; 24];
//! device.read(0, &mut header)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the spiboot CLI
//!
//! ```bash
//! # Identify the part on bus 0
//! spiboot info -t linux_spi
//!
//! # Specify device and SPI speed in kHz
//! spiboot read -t linux_spi:dev=/dev/spidev1.0,spispeed=4000 -o flash.bin
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device

pub mod device;
pub mod error;

pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};

use spiboot_core::transport::{Transport, TransportConfig};

/// Open a Linux SPI device and return a boxed Transport
///
/// This is a convenience function for use in the CLI transport dispatch.
///
/// # Example Options
///
/// - `dev=/dev/spidev0.0` - device path (default: `/dev/spidev<peripheral>.0`)
/// - `spispeed=4000` - speed in kHz (default: 2000)
/// - `mode=0` - SPI mode 0-3 (default: from the clock polarity and phase)
pub fn open_linux_spi(
    options: &[(&str, &str)],
    peripheral: u8,
    transport: &TransportConfig,
) -> std::result::Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    let config = parse_options(options, peripheral, transport)?;
    let spi = LinuxSpi::open(&config)?;
    Ok(Box::new(spi))
}

//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the `Transport`
//! trait using Linux's spidev interface.

use crate::error::{LinuxSpiError, Result};

use spiboot_core::error::{Error as CoreError, Result as CoreResult};
use spiboot_core::transport::{Transport, TransportConfig};

use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, RawFd};

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default SPI clock speed in Hz (2 MHz)
const DEFAULT_SPEED_HZ: u32 = 2_000_000;

/// Word size; spidev transfers are always byte-wide here
const BITS_PER_WORD: u8 = 8;

/// Peripheral indexes map to spidev bus numbers, which are not enumerated
const MAX_BUS: u8 = u8::MAX;

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr), _IOC_WRITE = 1
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

const _: () = assert!(std::mem::size_of::<SpiIocTransfer>() == ioctl::SPI_IOC_TRANSFER_SIZE);

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// SPI clock speed in Hz (default: 2 MHz)
    pub speed_hz: u32,
    /// SPI mode (0-3)
    pub mode: u8,
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_0,
        }
    }

    /// Configuration for SPI controller `peripheral`, chip-select 0
    ///
    /// The mode follows the clock polarity and phase in `transport`.
    pub fn for_peripheral(peripheral: u8, transport: &TransportConfig) -> Result<Self> {
        transport
            .check(peripheral, MAX_BUS)
            .map_err(LinuxSpiError::Unsupported)?;
        Ok(Self::new(format!("/dev/spidev{}.0", peripheral)).with_mode(transport.spi.mode()))
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// Linux SPI transport using spidev interface
///
/// spidev frames chip-select per ioctl. Every message sent while the device
/// is selected ends with `cs_change` set, which keeps the line asserted;
/// release sends an empty message without it.
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Current speed in Hz
    speed_hz: u32,
    selected: bool,
}

impl LinuxSpi {
    /// Open a Linux SPI device with the given configuration
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.mode > mode::MODE_3 {
            return Err(LinuxSpiError::InvalidParameter(format!(
                "SPI mode {} (must be 0-3)",
                config.mode
            )));
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        configure(file.as_raw_fd(), config.mode, config.speed_hz)?;

        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz)",
            config.device,
            config.mode,
            config.speed_hz / 1000
        );

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            max_kernel_buf_size,
            speed_hz: config.speed_hz,
            selected: false,
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Get current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    fn transfer(&self, tx: Option<&[u8]>, rx: Option<&mut [u8]>, cs_change: bool) -> SpiIocTransfer {
        let (tx_buf, tx_len) = tx.map_or((0, 0), |b| (b.as_ptr() as u64, b.len()));
        let (rx_buf, rx_len) = rx.map_or((0, 0), |b| (b.as_mut_ptr() as u64, b.len()));
        SpiIocTransfer {
            tx_buf,
            rx_buf,
            len: tx_len.max(rx_len) as u32,
            speed_hz: self.speed_hz,
            bits_per_word: BITS_PER_WORD,
            cs_change: cs_change as u8,
            ..Default::default()
        }
    }

    /// Send one SPI_IOC_MESSAGE
    fn message(&self, transfers: &[SpiIocTransfer]) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let ioctl_num = ioctl::spi_ioc_message(transfers.len() as u8);
        let ret = unsafe { libc::ioctl(fd, ioctl_num, transfers.as_ptr()) };

        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    /// Clock out `data` and keep chip-select asserted
    fn write_frame(&self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(self.max_kernel_buf_size) {
            self.message(&[self.transfer(Some(chunk), None, true)])?;
        }
        Ok(())
    }

    /// Clock in `buf` and keep chip-select asserted
    fn read_frame(&self, buf: &mut [u8]) -> Result<()> {
        for chunk in buf.chunks_mut(self.max_kernel_buf_size) {
            self.message(&[self.transfer(None, Some(chunk), true)])?;
        }
        Ok(())
    }

    fn check<V>(&self, result: Result<V>) -> CoreResult<V> {
        result.map_err(|e| {
            log::error!("linux_spi: {}", e);
            CoreError::TransferFailed
        })
    }
}

impl Transport for LinuxSpi {
    fn assert_select(&mut self) -> CoreResult<()> {
        if self.selected {
            return Err(CoreError::TransferFailed);
        }
        self.selected = true;
        Ok(())
    }

    fn release_select(&mut self) {
        if !self.selected {
            return;
        }
        self.selected = false;
        // A zero-length transfer without cs_change deasserts chip-select
        if let Err(e) = self.message(&[self.transfer(None, None, false)]) {
            log::error!("linux_spi: failed to release chip-select: {}", e);
        }
    }

    fn transfer_bytes(&mut self, data: &[u8]) -> CoreResult<usize> {
        if !self.selected {
            return Err(CoreError::TransferFailed);
        }
        let result = self.write_frame(data);
        self.check(result)?;
        Ok(data.len())
    }

    fn transfer_byte(&mut self, out: u8) -> CoreResult<u8> {
        if !self.selected {
            return Err(CoreError::TransferFailed);
        }
        let tx = [out];
        let mut rx = [0u8; 1];
        let result = self.message(&[self.transfer(Some(&tx[..]), Some(&mut rx[..]), true)]);
        self.check(result)?;
        Ok(rx[0])
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> CoreResult<()> {
        if !self.selected {
            return Err(CoreError::TransferFailed);
        }
        let result = self.read_frame(buf);
        self.check(result)
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Apply mode, word size and clock to an open spidev descriptor
fn configure(fd: RawFd, mode: u8, speed: u32) -> Result<()> {
    // SAFETY: `fd` is an open spidev descriptor and each pointer refers to a
    // live local of the type the ioctl expects.
    unsafe { ioctl::spi_ioc_wr_mode(fd, &mode) }.map_err(|e| LinuxSpiError::SetModeFailed {
        mode,
        source: e.into(),
    })?;

    let bits = BITS_PER_WORD;
    unsafe { ioctl::spi_ioc_wr_bits_per_word(fd, &bits) }.map_err(|e| {
        LinuxSpiError::SetBitsPerWordFailed {
            bits,
            source: e.into(),
        }
    })?;

    unsafe { ioctl::spi_ioc_wr_max_speed_hz(fd, &speed) }.map_err(|e| {
        LinuxSpiError::SetSpeedFailed {
            speed,
            source: e.into(),
        }
    })?;
    Ok(())
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    // Fall back to page size
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

/// Parse transport options from a list of key-value pairs
///
/// Without `dev=`, the device is `/dev/spidev<peripheral>.0`.
pub fn parse_options(
    options: &[(&str, &str)],
    peripheral: u8,
    transport: &TransportConfig,
) -> Result<LinuxSpiConfig> {
    let mut config = LinuxSpiConfig::for_peripheral(peripheral, transport)?;

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "spispeed" => {
                // Parse speed in kHz
                let speed_khz: u32 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("spispeed value: {}", value))
                })?;
                config.speed_hz = speed_khz.checked_mul(1000).ok_or_else(|| {
                    LinuxSpiError::InvalidParameter(format!("spispeed value: {}", value))
                })?;
            }
            "mode" => {
                let mode: u8 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("mode value: {}", value))
                })?;
                if mode > mode::MODE_3 {
                    return Err(LinuxSpiError::InvalidParameter(format!(
                        "SPI mode {} (must be 0-3)",
                        mode
                    )));
                }
                config.mode = mode;
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiboot_core::transport::{PinMode, Role};

    /// A transport on a descriptor that rejects every SPI ioctl
    fn not_spidev() -> LinuxSpi {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/null")
            .unwrap();
        LinuxSpi {
            file,
            max_kernel_buf_size: 4096,
            speed_hz: DEFAULT_SPEED_HZ,
            selected: false,
        }
    }

    #[test]
    fn test_write_failure_is_returned() {
        let mut spi = not_spidev();
        spi.assert_select().unwrap();
        assert_eq!(spi.transfer_bytes(&[0x02, 0x00, 0x01, 0x00, 0xAA]), Err(CoreError::TransferFailed));
        assert_eq!(spi.transfer_byte(0x05), Err(CoreError::TransferFailed));
        let mut buf = [0u8; 4];
        assert_eq!(spi.read_bytes(&mut buf), Err(CoreError::TransferFailed));
        spi.release_select();
        assert!(!spi.selected);
    }

    #[test]
    fn test_transfers_need_select() {
        let mut spi = not_spidev();
        assert_eq!(spi.transfer_bytes(&[0x06]), Err(CoreError::TransferFailed));
        spi.assert_select().unwrap();
        assert_eq!(spi.assert_select(), Err(CoreError::TransferFailed));
    }

    #[test]
    fn test_parse_options_defaults() {
        let config = parse_options(&[], 1, &TransportConfig::default()).unwrap();
        assert_eq!(config.device, "/dev/spidev1.0");
        assert_eq!(config.speed_hz, DEFAULT_SPEED_HZ);
        // Default polarity 1, phase 0
        assert_eq!(config.mode, mode::MODE_2);
    }

    #[test]
    fn test_parse_options_overrides() {
        let options = [("dev", "/dev/spidev0.1"), ("spispeed", "8000"), ("mode", "3")];
        let config = parse_options(&options, 0, &TransportConfig::default()).unwrap();
        assert_eq!(
            config,
            LinuxSpiConfig::new("/dev/spidev0.1")
                .with_speed(8_000_000)
                .with_mode(3)
        );
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        let transport = TransportConfig::default();
        assert!(parse_options(&[("mode", "4")], 0, &transport).is_err());
        assert!(parse_options(&[("spispeed", "fast")], 0, &transport).is_err());
        assert!(parse_options(&[("spispeed", "5000000")], 0, &transport).is_err());
    }

    #[test]
    fn test_unsupported_transport() {
        let slave = TransportConfig {
            role: Role::Slave,
            ..Default::default()
        };
        assert!(matches!(
            parse_options(&[], 0, &slave),
            Err(LinuxSpiError::Unsupported(_))
        ));

        let three_pin = TransportConfig {
            mode: PinMode::ThreePin,
            ..Default::default()
        };
        assert!(LinuxSpiConfig::for_peripheral(0, &three_pin).is_err());
    }

    #[test]
    fn test_ioc_message_number() {
        // _IOW('k', 0, char[32]) and _IOW('k', 0, char[64])
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6B00);
        assert_eq!(ioctl::spi_ioc_message(2), 0x4040_6B00);
    }
}

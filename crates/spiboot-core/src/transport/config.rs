//! Transport open parameters

use crate::error::{OpenFailure, Result};

/// Controller role on the bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    /// Controller drives the clock and device-select
    #[default]
    Master,
    /// Controller is driven by another master
    Slave,
}

/// Controller pin configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PinMode {
    /// Clock, data in and data out only
    ThreePin,
    /// Three pins plus a chip-select line
    #[default]
    FourPinCs,
    /// Three pins plus an enable line
    FourPinEnable,
    /// Three pins plus chip-select and enable
    FivePin,
}

impl PinMode {
    /// Returns true if this mode carries a device-select line
    pub const fn has_select(&self) -> bool {
        !matches!(self, Self::ThreePin)
    }
}

/// Clock and framing options for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// Clock polarity (idle level)
    pub polarity: u8,
    /// Clock phase (sampling edge)
    pub phase: u8,
    /// Clock prescaler from the module clock
    pub prescaler: u8,
    /// Bits per character
    pub char_len: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            polarity: 1,
            phase: 0,
            prescaler: 79,
            char_len: 8,
        }
    }
}

impl SpiConfig {
    /// SPI mode number (0-3) for this polarity/phase pair
    pub const fn mode(&self) -> u8 {
        ((self.polarity & 1) << 1) | (self.phase & 1)
    }
}

/// Everything needed to open a transport channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Controller role
    pub role: Role,
    /// Pin configuration
    pub mode: PinMode,
    /// Clock and framing options
    pub spi: SpiConfig,
}

impl TransportConfig {
    /// Check that a channel on `peripheral` can be opened with this configuration
    ///
    /// `count` is the number of SPI controllers the platform provides.
    pub fn check(&self, peripheral: u8, count: u8) -> Result<()> {
        if peripheral >= count {
            return Err(OpenFailure::InvalidPeripheral {
                index: peripheral,
                count,
            }
            .into());
        }
        if self.role != Role::Master {
            return Err(OpenFailure::UnsupportedRole.into());
        }
        if !self.mode.has_select() {
            return Err(OpenFailure::UnsupportedMode.into());
        }
        if self.spi.char_len != 8 {
            return Err(OpenFailure::UnsupportedCharLen(self.spi.char_len).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_config_is_openable() {
        let config = TransportConfig::default();
        assert_eq!(config.spi.mode(), 2);
        assert!(config.check(0, 5).is_ok());
        assert!(config.check(4, 5).is_ok());
    }

    #[test]
    fn test_check_rejects_bad_peripheral() {
        let config = TransportConfig::default();
        assert_eq!(
            config.check(5, 5),
            Err(Error::OpenFailure(OpenFailure::InvalidPeripheral {
                index: 5,
                count: 5
            }))
        );
    }

    #[test]
    fn test_check_rejects_role_and_mode() {
        let slave = TransportConfig {
            role: Role::Slave,
            ..Default::default()
        };
        assert_eq!(
            slave.check(0, 1),
            Err(Error::OpenFailure(OpenFailure::UnsupportedRole))
        );

        let three_pin = TransportConfig {
            mode: PinMode::ThreePin,
            ..Default::default()
        };
        assert_eq!(
            three_pin.check(0, 1),
            Err(Error::OpenFailure(OpenFailure::UnsupportedMode))
        );

        let wide = TransportConfig {
            spi: SpiConfig {
                char_len: 16,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            wide.check(0, 1),
            Err(Error::OpenFailure(OpenFailure::UnsupportedCharLen(16)))
        );
    }
}

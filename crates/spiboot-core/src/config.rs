//! TOML configuration files
//!
//! Every section is optional:
//!
//! ```toml
//! [memory]
//! class = "nor"            # "eeprom", "nor" or "atmel"; omit to auto-detect
//! address_width = 24
//! page_size = 256
//! sector_size = "4 KiB"
//! block_size = "64 KiB"
//! capacity = "512 KiB"
//! fast_read = true
//! unprotect = true
//!
//! [timeouts]
//! program = { poll_delay_us = 10, timeout_us = 10000 }
//! chip_erase = { poll_delay_us = 1000000, timeout_us = 200000000 }
//!
//! [boot]
//! app_header_offset = 0x8000
//! ram_start = 0x80000000
//! ram_end = 0x90000000
//! default_app_address = 0x81080000
//! ```
//!
//! Numbers may be written as integers, `"0x..."` hex strings or size
//! strings such as `"64 KiB"`.

use std::format;
use std::fs;
use std::path::Path;
use std::string::{String, ToString};

use thiserror::Error;

use crate::boot::BootLayout;
use crate::flash::DeviceConfig;
use crate::memory::{DeviceClass, MemoryParams};
use crate::protocol::{PollBudget, Timeouts};
use crate::spi::AddressWidth;

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML or has unknown keys
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Key that holds the value
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// Resulting geometry violates its invariants
    #[error("invalid memory geometry: {0}")]
    Params(crate::Error),
}

/// Parsed configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Device open options
    pub device: DeviceConfig,
    boot: TomlBoot,
}

impl Config {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfigFile = toml::from_str(content)?;

        let mut device = DeviceConfig::default();
        if let Some(memory) = file.memory {
            device.fast_read = memory.fast_read.unwrap_or(false);
            device.unprotect = memory.unprotect.unwrap_or(false);

            if let Some(name) = memory.class.as_deref() {
                let class = parse_class(name)?;
                device.params = Some(memory.params(class)?);
            } else if memory.has_geometry() {
                return Err(ConfigError::Invalid {
                    field: "memory.class",
                    message: "geometry given without a device class".into(),
                });
            }
        }

        if let Some(timeouts) = file.timeouts {
            device.timeouts = timeouts.apply(Timeouts::default());
        }

        Ok(Self {
            device,
            boot: file.boot.unwrap_or_default(),
        })
    }

    /// Boot layout for a device of `class`, with `[boot]` overrides applied
    pub fn boot_layout(&self, class: DeviceClass) -> BootLayout {
        let mut layout = BootLayout::for_class(class);
        let boot = &self.boot;
        if let Some(v) = boot.ubl_header_offset {
            layout.ubl_header_offset = v;
        }
        if let Some(v) = boot.app_header_offset {
            layout.app_header_offset = v;
        }
        if let Some(v) = boot.ram_start {
            layout.ram_start = v;
        }
        if let Some(v) = boot.ram_end {
            layout.ram_end = v;
        }
        if let Some(v) = boot.default_app_address {
            layout.default_app_address = v;
        }
        layout
    }
}

/// TOML file structure
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    memory: Option<TomlMemory>,
    timeouts: Option<TomlTimeouts>,
    boot: Option<TomlBoot>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlMemory {
    class: Option<String>,
    address_width: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    page_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    sector_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    block_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    capacity: Option<u32>,
    fast_read: Option<bool>,
    unprotect: Option<bool>,
}

impl TomlMemory {
    fn has_geometry(&self) -> bool {
        self.address_width.is_some()
            || self.page_size.is_some()
            || self.sector_size.is_some()
            || self.block_size.is_some()
            || self.capacity.is_some()
    }

    fn params(&self, class: DeviceClass) -> Result<MemoryParams, ConfigError> {
        let mut params = MemoryParams::default_for(class);
        if let Some(bits) = self.address_width {
            params.address_width =
                AddressWidth::from_bits(bits).ok_or_else(|| ConfigError::Invalid {
                    field: "memory.address_width",
                    message: format!("{} (expected 16 or 24)", bits),
                })?;
        }
        if let Some(v) = self.page_size {
            params.page_size = v;
        }
        if let Some(v) = self.sector_size {
            params.sector_size = v;
        }
        if let Some(v) = self.block_size {
            params.block_size = v;
        }
        if let Some(v) = self.capacity {
            params.capacity = v;
        }
        params.validate().map_err(ConfigError::Params)?;
        Ok(params)
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTimeouts {
    program: Option<TomlBudget>,
    sector_erase: Option<TomlBudget>,
    block_erase: Option<TomlBudget>,
    chip_erase: Option<TomlBudget>,
    write_status: Option<TomlBudget>,
}

impl TomlTimeouts {
    fn apply(&self, mut timeouts: Timeouts) -> Timeouts {
        let slots = [
            (&self.program, &mut timeouts.program),
            (&self.sector_erase, &mut timeouts.sector_erase),
            (&self.block_erase, &mut timeouts.block_erase),
            (&self.chip_erase, &mut timeouts.chip_erase),
            (&self.write_status, &mut timeouts.write_status),
        ];
        for (budget, slot) in slots {
            if let Some(budget) = budget {
                *slot = PollBudget::new(budget.poll_delay_us, budget.timeout_us);
            }
        }
        timeouts
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBudget {
    #[serde(deserialize_with = "deserialize_size")]
    poll_delay_us: u32,
    #[serde(deserialize_with = "deserialize_size")]
    timeout_us: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBoot {
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    ubl_header_offset: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    app_header_offset: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    ram_start: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    ram_end: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    default_app_address: Option<u32>,
}

fn parse_class(name: &str) -> Result<DeviceClass, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "eeprom" => Ok(DeviceClass::Eeprom),
        "nor" | "flash" | "nor-flash" => Ok(DeviceClass::NorFlash),
        "atmel" | "atmel-flash" => Ok(DeviceClass::AtmelFlash),
        other => Err(ConfigError::Invalid {
            field: "memory.class",
            message: format!("unknown device class '{}'", other),
        }),
    }
}

/// Deserialize a u32 that can be an integer, hex string or size string
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    // Try to deserialize as a number first, then as a string
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match SizeOrInt::deserialize(deserializer)? {
        SizeOrInt::Int(n) => Ok(n),
        SizeOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

fn deserialize_opt_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_size(deserializer).map(Some)
}

/// Parse a size string like "64 KiB", "0x8000" or "4096"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    // Try plain number first
    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    // Try hex
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    // Try with suffix
    let s_lower = s.to_ascii_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("b") {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

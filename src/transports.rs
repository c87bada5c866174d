//! Transport registration and dispatch
//!
//! Transports are selected with a `name` or `name:key=value,...` string.

use spiboot_core::transport::{Transport, TransportConfig};
use std::collections::HashMap;

/// Information about a transport
pub struct TransportInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// All transports enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_transports() -> Vec<TransportInfo> {
    let mut transports = Vec::new();

    #[cfg(feature = "dummy")]
    transports.push(TransportInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory SPI memory emulator (class=<eeprom|nor|atmel>,file=<path>)",
    });

    #[cfg(feature = "linux-spi")]
    transports.push(TransportInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev interface (dev=/dev/spidevX.Y,spispeed=<kHz>,mode=<0-3>)",
    });

    transports
}

/// Short list of transport names for CLI help
pub fn transport_names_short() -> String {
    let names: Vec<&str> = available_transports().iter().map(|t| t.name).collect();
    names.join(", ")
}

/// Help text listing all available transports
pub fn transport_help() -> String {
    let transports = available_transports();

    if transports.is_empty() {
        return "No transports available (recompile with transport features enabled)".to_string();
    }

    let mut help = String::from("Transport to use, as name[:key=value,...]\n\nAvailable transports:\n");
    for t in &transports {
        help.push_str(&format!("  {:10} - {}\n", t.name, t.description));
        if !t.aliases.is_empty() {
            help.push_str(&format!("  {:10}   aliases: {}\n", "", t.aliases.join(", ")));
        }
    }
    help
}

/// Parsed transport parameters
#[derive(Debug)]
pub struct TransportParams {
    /// Transport name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

/// Parse a transport string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_transport_params(s: &str) -> Result<TransportParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(TransportParams {
        name: name.to_string(),
        params,
    })
}

/// Open a transport channel on `peripheral`
#[allow(unused_variables)]
pub fn open_transport(
    spec: &str,
    peripheral: u8,
    config: &TransportConfig,
) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    let params = parse_transport_params(spec)?;

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params, peripheral, config),

        #[cfg(feature = "linux-spi")]
        "linux_spi" | "linux-spi" | "spidev" => open_linux_spi(&params, peripheral, config),

        _ => Err(format!(
            "Unknown transport: {} [available: {}]",
            params.name,
            transport_names_short()
        )
        .into()),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(
    params: &TransportParams,
    peripheral: u8,
    config: &TransportConfig,
) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    use spiboot_core::memory::DeviceClass;
    use spiboot_dummy::{DummyConfig, DummyMemory};

    let mut dummy = match params.params.get("class").map(|s| s.as_str()) {
        None | Some("nor") => DummyConfig::nor_flash(),
        Some("eeprom") => DummyConfig::for_class(DeviceClass::Eeprom),
        Some("atmel") => DummyConfig::for_class(DeviceClass::AtmelFlash),
        Some(other) => {
            return Err(format!("Invalid dummy class: {} (eeprom, nor or atmel)", other).into())
        }
    };
    if let Some(busy) = params.params.get("busy") {
        dummy.busy_polls = busy
            .parse()
            .map_err(|_| format!("Invalid busy value: {}", busy))?;
    }

    config.check(peripheral, spiboot_dummy::PERIPHERAL_COUNT)?;

    let memory = match params.params.get("file") {
        Some(path) => {
            log::info!("Opening dummy memory backed by {}", path);
            DummyMemory::with_file(dummy, path)?
        }
        None => {
            log::info!("Opening in-memory dummy (contents are lost on exit)");
            DummyMemory::new(dummy)
        }
    };
    Ok(Box::new(memory))
}

#[cfg(feature = "linux-spi")]
fn open_linux_spi(
    params: &TransportParams,
    peripheral: u8,
    config: &TransportConfig,
) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    log::info!("Opening Linux SPI transport...");

    let options: Vec<(&str, &str)> = params
        .params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    spiboot_linux_spi::open_linux_spi(&options, peripheral, config).map_err(|e| {
        format!(
            "Failed to open Linux SPI device: {}\n\
             Make sure the device exists and you have read/write permissions.",
            e
        )
        .into()
    })
}

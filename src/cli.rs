//! CLI argument parsing

use crate::transports;
use clap::{Parser, Subcommand, ValueEnum};
use spiboot_core::config::parse_size;
use std::path::PathBuf;

/// Parse a hexadecimal address, with or without a `0x` prefix
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("Invalid hex value {:?}: {}", s, e))
}

/// Generate dynamic help text for the transport argument
fn transport_help_short() -> String {
    format!(
        "Transport to use [available: {}]",
        transports::transport_names_short()
    )
}

#[derive(Parser)]
#[command(name = "spiboot")]
#[command(author, version, about = "SPI memory flashing utility and boot image loader", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML) with geometry, timeouts and boot layout
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SPI controller index
    #[arg(long, global = true, default_value_t = 0)]
    pub peripheral: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Transport to use
    #[arg(
        short,
        long,
        default_value = "dummy",
        help = transport_help_short(),
        long_help = transports::transport_help()
    )]
    pub transport: String,

    /// Clear block protection bits after opening the device
    #[arg(long)]
    pub unprotect: bool,

    /// Use fast read where the device supports it
    #[arg(long)]
    pub fast_read: bool,
}

/// Boot stage whose header is loaded
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// First-stage loader (UBL) header
    Ubl,
    /// Application header
    App,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the device and show any boot headers
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Read memory contents to file
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex, e.g., 0x8000)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes to read (default: to the end of the device)
        #[arg(long, value_parser = parse_size)]
        length: Option<u32>,
    },

    /// Write file to memory
    Write {
        #[command(flatten)]
        device: DeviceArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x8000)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Don't erase before writing
        #[arg(long)]
        no_erase: bool,

        /// Don't verify after writing
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase memory (whole device unless a range is given)
    Erase {
        #[command(flatten)]
        device: DeviceArgs,

        /// Start address for partial erase (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32)]
        start: Option<u32>,

        /// Length of region to erase (hex, decimal or size like "64 KiB")
        #[arg(long, value_parser = parse_size)]
        length: Option<u32>,
    },

    /// Verify memory contents against file
    Verify {
        #[command(flatten)]
        device: DeviceArgs,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x8000)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,
    },

    /// Write first-stage and application boot images with headers
    ///
    /// Values not given on the command line are prompted for. Answer "none"
    /// to a file prompt to skip that stage.
    Flash {
        #[command(flatten)]
        device: DeviceArgs,

        /// First-stage loader (UBL) binary, or "none"
        #[arg(long)]
        ubl: Option<String>,

        /// Application binary, or "none"
        #[arg(long)]
        app: Option<String>,

        /// Application entry point (hex)
        #[arg(long, value_parser = parse_hex_u32)]
        entry: Option<u32>,

        /// Application load address (hex)
        #[arg(long, value_parser = parse_hex_u32)]
        load: Option<u32>,
    },

    /// Load a boot image into a simulated RAM window
    Boot {
        #[command(flatten)]
        device: DeviceArgs,

        /// Which header to start from
        #[arg(long, value_enum, default_value_t = Stage::Ubl)]
        stage: Stage,

        /// Header offset on the device (default: from the boot layout)
        #[arg(long, value_parser = parse_hex_u32)]
        header: Option<u32>,

        /// Base address of the RAM window (default: 0 for ubl, RAM start for app)
        #[arg(long, value_parser = parse_hex_u32)]
        ram_base: Option<u32>,

        /// Size of the RAM window (default: 32 KiB for ubl, 16 MiB for app)
        #[arg(long, value_parser = parse_size)]
        ram_size: Option<u32>,

        /// Write the loaded image bytes to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Commands {
    /// Device options of the selected command
    pub fn device(&self) -> &DeviceArgs {
        match self {
            Commands::Info { device }
            | Commands::Read { device, .. }
            | Commands::Write { device, .. }
            | Commands::Erase { device, .. }
            | Commands::Verify { device, .. }
            | Commands::Flash { device, .. }
            | Commands::Boot { device, .. } => device,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x8000"), Ok(0x8000));
        assert_eq!(parse_hex_u32("0X1F"), Ok(0x1F));
        assert_eq!(parse_hex_u32("256"), Ok(0x256));
        assert_eq!(parse_hex_u32("80008000"), Ok(0x8000_8000));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("").is_err());
    }

    #[test]
    fn test_parse_flash_command() {
        let cli = Cli::parse_from([
            "spiboot",
            "-v",
            "flash",
            "-t",
            "dummy:class=eeprom",
            "--ubl",
            "none",
            "--app",
            "u-boot.bin",
            "--entry",
            "0x81080000",
        ]);
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.command.device().transport, "dummy:class=eeprom");
        match cli.command {
            Commands::Flash {
                ubl, app, entry, load, ..
            } => {
                assert_eq!(ubl.as_deref(), Some("none"));
                assert_eq!(app.as_deref(), Some("u-boot.bin"));
                assert_eq!(entry, Some(0x8108_0000));
                assert_eq!(load, None);
            }
            _ => panic!("expected flash command"),
        }
    }

    #[test]
    fn test_unprefixed_addresses_are_hex() {
        let cli = Cli::parse_from([
            "spiboot", "flash", "--ubl", "none", "--app", "app.bin", "--entry", "80008000",
            "--load", "0x80000000",
        ]);
        match cli.command {
            Commands::Flash { entry, load, .. } => {
                assert_eq!(entry, Some(0x8000_8000));
                assert_eq!(load, Some(0x8000_0000));
            }
            _ => panic!("expected flash command"),
        }

        let cli = Cli::parse_from(["spiboot", "read", "-o", "out.bin", "--start", "8000"]);
        match cli.command {
            Commands::Read { start, .. } => assert_eq!(start, 0x8000),
            _ => panic!("expected read command"),
        }
    }

    #[test]
    fn test_parse_boot_command() {
        let cli = Cli::parse_from(["spiboot", "boot", "--stage", "app", "--ram-size", "1 MiB"]);
        match cli.command {
            Commands::Boot {
                stage, ram_size, ..
            } => {
                assert_eq!(stage, Stage::App);
                assert_eq!(ram_size, Some(1024 * 1024));
            }
            _ => panic!("expected boot command"),
        }
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

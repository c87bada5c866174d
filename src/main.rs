//! spiboot - SPI memory flashing utility and boot image loader
//!
//! Reads, writes and erases 25-series EEPROM and NOR flash parts over a
//! byte-level SPI transport, writes first-stage and application boot images
//! with their headers, and runs the boot header loader against a simulated
//! RAM window.
//!
//! Every command opens the selected transport, identifies the part (or uses
//! the geometry from `--config`) and then works through the same
//! [`spiboot_core::flash::DeviceHandle`], whatever transport is behind it.

mod cli;
mod commands;
mod transports;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{BootArgs, Device, FlashArgs};
use spiboot_core::config::Config;
use spiboot_core::flash::{DeviceConfig, DeviceHandle};
use spiboot_core::transport::TransportConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            Config::from_toml_file(path)?
        }
        None => Config::default(),
    };

    let args = cli.command.device();
    let mut device_config: DeviceConfig = config.device;
    device_config.unprotect |= args.unprotect;
    device_config.fast_read |= args.fast_read;

    let mut device = open_device(&args.transport, cli.peripheral, &device_config)?;
    let layout = config.boot_layout(device.params().class);
    log::debug!("Boot layout: {:?}", layout);

    match cli.command {
        Commands::Info { .. } => commands::run_info(&mut device, &layout),
        Commands::Read {
            output,
            start,
            length,
            ..
        } => commands::run_read(&mut device, &output, start, length),
        Commands::Write {
            input,
            start,
            no_erase,
            no_verify,
            ..
        } => commands::run_write(&mut device, &input, start, !no_erase, !no_verify),
        Commands::Erase { start, length, .. } => commands::run_erase(&mut device, start, length),
        Commands::Verify { input, start, .. } => commands::run_verify(&mut device, &input, start),
        Commands::Flash {
            ubl,
            app,
            entry,
            load,
            ..
        } => commands::run_flash(
            &mut device,
            &layout,
            FlashArgs {
                ubl,
                app,
                entry,
                load,
            },
        ),
        Commands::Boot {
            stage,
            header,
            ram_base,
            ram_size,
            output,
            ..
        } => commands::run_boot(
            &mut device,
            &layout,
            BootArgs {
                stage,
                header,
                ram_base,
                ram_size,
                output,
            },
        ),
    }
}

/// Open the transport and the memory device behind it
fn open_device(
    transport: &str,
    peripheral: u8,
    config: &DeviceConfig,
) -> Result<Device, Box<dyn std::error::Error>> {
    let bus = transports::open_transport(transport, peripheral, &TransportConfig::default())?;
    let device = DeviceHandle::open(bus, config)?;
    Ok(device)
}

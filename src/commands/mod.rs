//! CLI command implementations
//!
//! Every command works on an open [`Device`], whatever transport is behind
//! it. Long-running operations report through [`progress::IndicatifProgress`].

mod boot;
mod erase;
mod flash;
mod info;
mod progress;
mod read;
mod verify;
mod write;

pub use boot::{run_boot, BootArgs};
pub use erase::run_erase;
pub use flash::{run_flash, FlashArgs};
pub use info::run_info;
pub use read::run_read;
pub use verify::run_verify;
pub use write::run_write;

use spiboot_core::flash::DeviceHandle;
use spiboot_core::transport::Transport;

/// An open device on a dynamically selected transport
pub type Device = DeviceHandle<Box<dyn Transport>>;

/// Result type shared by the commands
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Print the one-line device summary every command starts with
fn print_device(device: &Device) {
    let params = device.params();
    match device.part() {
        Some(part) => println!(
            "Found: {} {} ({}, {} bytes)",
            part.vendor,
            part.name,
            params.class.name(),
            params.capacity
        ),
        None => println!(
            "Using: {} ({} bytes, {}-bit addressing)",
            params.class.name(),
            params.capacity,
            params.address_width.bits()
        ),
    }
}

/// Reject a range that runs past the end of the device
fn check_range(device: &Device, start: u32, len: usize) -> CommandResult {
    if !device.params().is_valid_range(start, len) {
        return Err(format!(
            "Range 0x{:08X}+{} bytes is outside the device (0x{:08X} bytes)",
            start,
            len,
            device.capacity()
        )
        .into());
    }
    Ok(())
}

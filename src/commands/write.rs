//! Write command implementation

use super::progress::IndicatifProgress;
use super::{check_range, print_device, CommandResult, Device};
use std::path::Path;

/// Write a file at `start`, erasing first and verifying after unless disabled
pub fn run_write(
    device: &mut Device,
    input: &Path,
    start: u32,
    erase: bool,
    verify: bool,
) -> CommandResult {
    print_device(device);

    let data = std::fs::read(input)?;
    if data.is_empty() {
        return Err(format!("{:?} is empty", input).into());
    }
    check_range(device, start, data.len())?;
    println!("Writing {} bytes from {:?} at 0x{:08X}", data.len(), input, start);

    let mut progress = IndicatifProgress::new();
    if erase {
        device.erase_range_with(start, data.len() as u32, &mut progress)?;
    }
    device.write_range_with(start, &data, &mut progress)?;
    if verify {
        device.verify_range_with(start, &data, &mut progress)?;
    }
    progress.finish();

    if verify {
        println!("Write complete, verified {} bytes", data.len());
    } else {
        println!("Write complete");
    }
    Ok(())
}

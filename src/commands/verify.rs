//! Verify command implementation

use super::progress::IndicatifProgress;
use super::{check_range, print_device, CommandResult, Device};
use spiboot_core::Error;
use std::path::Path;

/// Compare the device contents at `start` with a file
pub fn run_verify(device: &mut Device, input: &Path, start: u32) -> CommandResult {
    print_device(device);

    let data = std::fs::read(input)?;
    check_range(device, start, data.len())?;

    let mut progress = IndicatifProgress::new();
    match device.verify_range_with(start, &data, &mut progress) {
        Ok(len) => {
            progress.finish();
            println!("Verified {} bytes at 0x{:08X}", len, start);
            Ok(())
        }
        Err(Error::VerifyMismatch { offset }) => Err(format!(
            "Verification failed at 0x{:08X} (file offset 0x{:X})",
            start + offset,
            offset
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

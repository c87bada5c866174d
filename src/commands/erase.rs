//! Erase command implementation

use super::progress::{spinner, IndicatifProgress};
use super::{print_device, CommandResult, Device};

/// Erase a range, or the whole device when neither bound is given
pub fn run_erase(device: &mut Device, start: Option<u32>, length: Option<u32>) -> CommandResult {
    print_device(device);

    match (start, length) {
        (Some(start), Some(len)) => {
            let mut progress = IndicatifProgress::new();
            device.erase_range_with(start, len, &mut progress)?;
            progress.finish();
            println!("Erased {} bytes starting at 0x{:08X}", len, start);
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err("Both --start and --length must be specified for partial erase".into());
        }
        (None, None) => {
            let total = device.capacity();
            let pb = spinner(format!(
                "Erasing {} bytes (this may take a while)...",
                total
            ));
            match device.erase_all() {
                Ok(()) => pb.finish_with_message(format!("Erased {} bytes", total)),
                Err(e) => {
                    pb.abandon();
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

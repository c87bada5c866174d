//! Read command implementation

use super::progress::bar;
use super::{check_range, print_device, CommandResult, Device};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Default chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Read `length` bytes (default: to the end of the device) from `start` into a file
pub fn run_read(
    device: &mut Device,
    output: &Path,
    start: u32,
    length: Option<u32>,
) -> CommandResult {
    print_device(device);

    let length = match length {
        Some(length) => length,
        None => device.capacity().checked_sub(start).ok_or_else(|| {
            format!("Start address 0x{:08X} is beyond the end of the device", start)
        })?,
    };
    check_range(device, start, length as usize)?;

    let data = read_with_progress(device, start, length as usize)?;

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

/// Read a range with a progress bar
pub fn read_with_progress(
    device: &mut Device,
    start: u32,
    len: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut data = vec![0u8; len];
    let pb = bar(len as u64, "Reading");

    let mut offset = 0usize;
    while offset < len {
        let chunk_size = std::cmp::min(READ_CHUNK_SIZE, len - offset);
        let chunk = &mut data[offset..offset + chunk_size];

        if let Err(e) = device.read(start + offset as u32, chunk) {
            pb.abandon();
            return Err(e.into());
        }

        offset += chunk_size;
        pb.set_position(offset as u64);
    }

    pb.finish_with_message("Read complete");
    Ok(data)
}

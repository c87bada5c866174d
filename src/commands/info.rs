//! Info command implementation

use super::{print_device, CommandResult, Device};
use spiboot_core::boot::{read_header, BootLayout, HEADER_LEN};

/// Show device geometry, status and any boot headers
pub fn run_info(device: &mut Device, layout: &BootLayout) -> CommandResult {
    print_device(device);

    let params = *device.params();
    println!();
    println!("Device Information:");
    if let Some(part) = device.part() {
        println!("  Vendor:        {}", part.vendor);
        println!("  Name:          {}", part.name);
    }
    println!("  Class:         {}", params.class.name());
    println!("  Profile:       {:?}", device.profile());
    println!("  Capacity:      {} bytes", params.capacity);
    println!("  Addressing:    {}-bit", params.address_width.bits());
    println!("  Page size:     {} bytes", params.page_size);
    println!("  Sector size:   {} bytes", params.sector_size);
    println!("  Block size:    {} bytes", params.block_size);

    let status = device.status()?;
    println!(
        "  Status:        0x{:02X}{}",
        status.bits(),
        if status.is_protected() {
            " (block protection enabled)"
        } else {
            ""
        }
    );

    println!();
    println!("Boot Headers:");
    for (name, offset) in [
        ("UBL", layout.ubl_header_offset),
        ("Application", layout.app_header_offset),
    ] {
        if !params.is_valid_range(offset, HEADER_LEN) {
            println!("  {:12} 0x{:06X}: beyond end of device", name, offset);
            continue;
        }
        let header = read_header(device, offset)?;
        match header.validate() {
            Ok(kind) => println!(
                "  {:12} 0x{:06X}: {:?} image, {} bytes from 0x{:06X} to 0x{:08X}, entry 0x{:08X}",
                name,
                offset,
                kind,
                header.image_size(),
                header.source_offset(),
                header.load_address(),
                header.entry_point()
            ),
            Err(_) => println!(
                "  {:12} 0x{:06X}: none (magic 0x{:08X})",
                name,
                offset,
                header.magic()
            ),
        }
    }

    Ok(())
}

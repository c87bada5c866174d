//! Boot command: run the header loader into a simulated RAM window

use super::{print_device, CommandResult, Device};
use crate::cli::Stage;
use spiboot_core::boot::{BootLayout, BootLoader, LoadRegion, LoaderState};
use std::path::PathBuf;

/// Internal RAM size assumed for first-stage images
const IRAM_SIZE: u32 = 32 * 1024;
/// External RAM window assumed for applications
const DDR_WINDOW: u32 = 16 * 1024 * 1024;

/// Options for [`run_boot`]
#[derive(Debug)]
pub struct BootArgs {
    pub stage: Stage,
    pub header: Option<u32>,
    pub ram_base: Option<u32>,
    pub ram_size: Option<u32>,
    pub output: Option<PathBuf>,
}

/// Load the image behind a boot header and report its entry point
pub fn run_boot(device: &mut Device, layout: &BootLayout, args: BootArgs) -> CommandResult {
    print_device(device);

    let (default_header, default_base, default_size) = match args.stage {
        Stage::Ubl => (layout.ubl_header_offset, 0, IRAM_SIZE),
        Stage::App => (layout.app_header_offset, layout.ram_start, DDR_WINDOW),
    };
    let header_offset = args.header.unwrap_or(default_header);
    let base = args.ram_base.unwrap_or(default_base);
    let size = args.ram_size.unwrap_or(default_size);
    if base.checked_add(size).is_none() {
        return Err(format!(
            "RAM window 0x{:08X}+0x{:X} wraps the address space",
            base, size
        )
        .into());
    }

    println!(
        "Loading header at 0x{:06X} into RAM 0x{:08X}..0x{:08X}",
        header_offset,
        base,
        base + size
    );

    let mut ram = vec![0u8; size as usize];
    let mut loader = BootLoader::new(device, header_offset, LoadRegion::new(base, &mut ram));
    let image = loop {
        match *loader.step() {
            LoaderState::Done(image) => break image,
            LoaderState::Abort(e) => return Err(format!("Boot aborted: {}", e).into()),
            state => log::debug!("Loader state: {:?}", state),
        }
    };

    let header = image.header;
    println!(
        "Loaded {:?} image: {} bytes from 0x{:06X} to 0x{:08X}",
        image.kind,
        header.image_size(),
        header.source_offset(),
        header.load_address()
    );
    println!("Entry point: 0x{:08X}", image.entry_point);

    if let Some(path) = &args.output {
        let start = (header.load_address() - base) as usize;
        let end = start + header.image_size() as usize;
        std::fs::write(path, &ram[start..end])?;
        println!("Wrote {} loaded bytes to {:?}", end - start, path);
    }

    Ok(())
}

//! Boot header loading and image programming against the emulated parts

use spiboot_core::boot::{
    load_image, program_image, BootHeader, BootLayout, BootLoader, ImageKind, ImageSpec,
    LoadRegion, LoaderState, ReadOptions, HEADER_LEN,
};
use spiboot_core::flash::{DeviceConfig, DeviceHandle};
use spiboot_core::memory::DeviceClass;
use spiboot_core::spi::opcodes;
use spiboot_core::Error;
use spiboot_dummy::{DummyConfig, DummyMemory, Fault};

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// NOR part with `header` at 0 and `payload` at 512
fn medium(header: BootHeader, payload: &[u8]) -> DeviceHandle<DummyMemory> {
    let mut memory = DummyMemory::new_default();
    memory.data_mut()[..HEADER_LEN].copy_from_slice(&header.to_bytes());
    memory.data_mut()[512..512 + payload.len()].copy_from_slice(payload);
    let mut handle = DeviceHandle::open(memory, &DeviceConfig::default()).unwrap();
    handle.transport_mut().clear_log();
    handle
}

#[test]
fn test_load_valid_image() {
    let payload = image(4096);
    let header = BootHeader::new(0xA1AC_ED00, 0x100, 4096, 0, 512, 0x20);
    let mut handle = medium(header, &payload);

    let mut ram = vec![0u8; 0x2000];
    let loaded = load_image(&mut handle, 0, LoadRegion::new(0, &mut ram)).unwrap();

    assert_eq!(loaded.entry_point, 0x100);
    assert_eq!(loaded.kind, ImageKind::Addr24);
    assert_eq!(&ram[0x20..0x20 + 4096], payload.as_slice());
    assert!(ram[..0x20].iter().all(|&b| b == 0));
    assert!(ram[0x20 + 4096..].iter().all(|&b| b == 0));
}

#[test]
fn test_invalid_magic_leaves_destination_untouched() {
    let payload = image(4096);
    let header = BootHeader::new(0x1234_5678, 0x100, 4096, 0, 512, 0x20);
    let mut handle = medium(header, &payload);

    let mut ram = vec![0xAAu8; 0x2000];
    let result = load_image(&mut handle, 0, LoadRegion::new(0, &mut ram));

    assert_eq!(result, Err(Error::InvalidImage { magic: 0x1234_5678 }));
    assert!(ram.iter().all(|&b| b == 0xAA));

    // Only the header was read
    let reads: Vec<_> = handle
        .transport_mut()
        .transactions()
        .iter()
        .filter(|t| t.opcode == opcodes::READ)
        .map(|t| (t.address, t.data_len))
        .collect();
    assert_eq!(reads, [(Some(0), HEADER_LEN)]);
}

#[test]
fn test_loader_states() {
    let payload = image(64);
    let header = BootHeader::new(0xA1AC_ED66, 0x8000_0000, 64, 0, 512, 0x8000_0000);
    let mut handle = medium(header, &payload);

    let mut ram = vec![0u8; 256];
    let mut loader = BootLoader::new(&mut handle, 0, LoadRegion::new(0x8000_0000, &mut ram));
    assert_eq!(*loader.state(), LoaderState::Start);
    assert_eq!(*loader.step(), LoaderState::ReadHeader);
    assert_eq!(
        *loader.step(),
        LoaderState::Valid(header, ImageKind::ExecuteInPlace)
    );
    assert_eq!(
        *loader.step(),
        LoaderState::ReadImage(header, ImageKind::ExecuteInPlace)
    );
    assert!(matches!(loader.step(), LoaderState::Done(image) if image.entry_point == 0x8000_0000));
    assert!(loader.state().is_terminal());
    assert_eq!(&loader.region().as_slice()[..64], payload.as_slice());
}

#[test]
fn test_invalid_states() {
    let header = BootHeader::new(0xFFFF_FFFF, 0, 0, 0, 0, 0);
    let mut handle = medium(header, &[]);
    let error = Error::InvalidImage { magic: 0xFFFF_FFFF };

    let mut ram = [0u8; 16];
    let mut loader = BootLoader::new(&mut handle, 0, LoadRegion::new(0, &mut ram));
    loader.step();
    assert_eq!(*loader.step(), LoaderState::Invalid(error));
    assert_eq!(*loader.step(), LoaderState::Abort(error));
    assert_eq!(*loader.step(), LoaderState::Abort(error));
}

#[test]
fn test_image_must_fit_region() {
    let payload = image(4096);
    let header = BootHeader::new(0xA1AC_ED00, 0x100, 4096, 0, 512, 0x20);
    let mut handle = medium(header, &payload);

    let mut ram = vec![0u8; 4096];
    let result = load_image(&mut handle, 0, LoadRegion::new(0, &mut ram));
    assert_eq!(result, Err(Error::SizeOverflow));
    assert!(ram.iter().all(|&b| b == 0));
}

#[test]
fn test_image_must_fit_device() {
    let header = BootHeader::new(0xA1AC_ED00, 0, 0x1000, 0, 512 * 1024 - 0x800, 0);
    let mut handle = medium(header, &[]);

    let mut ram = vec![0u8; 0x1000];
    let result = load_image(&mut handle, 0, LoadRegion::new(0, &mut ram));
    assert_eq!(result, Err(Error::SizeOverflow));
}

#[test]
fn test_program_then_boot() {
    let mut handle =
        DeviceHandle::open(DummyMemory::new_default(), &DeviceConfig::default()).unwrap();
    let layout = BootLayout::for_class(handle.params().class);

    let ubl = image(3000);
    let header = program_image(
        &mut handle,
        layout.ubl_header_offset,
        &ImageSpec::first_stage(&ubl),
    )
    .unwrap();
    assert_eq!(header.magic(), 0xA1AC_ED00);
    assert_eq!(header.source_offset(), 256);
    assert_eq!(
        header.read_options(),
        ReadOptions {
            prescaler: 0x31,
            fast_read: true
        }
    );

    let app = image(5000);
    let entry = 0x8000_0100;
    program_image(
        &mut handle,
        layout.app_header_offset,
        &ImageSpec::application(&app, entry, layout.ram_start),
    )
    .unwrap();

    let mut iram = vec![0u8; 0x4000];
    let loaded = load_image(
        &mut handle,
        layout.ubl_header_offset,
        LoadRegion::new(0, &mut iram),
    )
    .unwrap();
    assert_eq!(loaded.entry_point, 0x100);
    assert_eq!(&iram[0x20..0x20 + ubl.len()], ubl.as_slice());

    let mut ram = vec![0u8; 0x10000];
    let loaded = load_image(
        &mut handle,
        layout.app_header_offset,
        LoadRegion::new(layout.ram_start, &mut ram),
    )
    .unwrap();
    assert_eq!(loaded.entry_point, entry);
    assert_eq!(&ram[..app.len()], app.as_slice());
}

#[test]
fn test_program_eeprom_uses_addr16_magic() {
    let mut handle =
        DeviceHandle::open(DummyMemory::new(DummyConfig::eeprom()), &DeviceConfig::default())
            .unwrap();
    assert_eq!(handle.params().class, DeviceClass::Eeprom);

    let app = image(1000);
    let header = program_image(
        &mut handle,
        0x4000,
        &ImageSpec::application(&app, 0x8000_0000, 0x8000_0000),
    )
    .unwrap();
    assert_eq!(header.validate(), Ok(ImageKind::Addr16));
    // 64 byte pages: header takes one page
    assert_eq!(header.source_offset(), 0x4040);
}

#[test]
fn test_program_rejects_bad_images() {
    let mut handle =
        DeviceHandle::open(DummyMemory::new_default(), &DeviceConfig::default()).unwrap();
    handle.transport_mut().clear_log();

    let empty = ImageSpec::application(&[], 0, 0);
    assert_eq!(program_image(&mut handle, 0, &empty), Err(Error::EmptyImage));

    let big = vec![0u8; 512 * 1024];
    let too_big = ImageSpec::application(&big, 0, 0);
    assert_eq!(program_image(&mut handle, 0, &too_big), Err(Error::SizeOverflow));

    assert!(handle.transport_mut().transactions().is_empty());
}

#[test]
fn test_failed_image_write_leaves_no_header() {
    let mut handle =
        DeviceHandle::open(DummyMemory::new_default(), &DeviceConfig::default()).unwrap();
    handle.transport_mut().set_fault(Some(Fault::DropProgram));

    let app = image(600);
    let result = program_image(&mut handle, 0x8000, &ImageSpec::application(&app, 0, 0));
    assert_eq!(result, Err(Error::VerifyMismatch { offset: 0 }));

    handle.transport_mut().set_fault(None);
    handle.check_erased(0x8000, HEADER_LEN as u32).unwrap();
}

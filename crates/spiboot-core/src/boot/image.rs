//! Writing a header + image pair to the medium

use super::{header_span, BootHeader, ImageKind, ReadOptions};
use crate::error::{Error, Result};
use crate::flash::{DeviceHandle, NoProgress, Progress};
use crate::transport::Transport;

/// An image and the header fields that describe it
#[derive(Debug, Clone, Copy)]
pub struct ImageSpec<'a> {
    /// Image bytes
    pub data: &'a [u8],
    /// Address execution starts at
    pub entry_point: u32,
    /// RAM address the image is copied to
    pub load_address: u32,
    /// Reserved header word
    pub reserved: u32,
    /// Variant; `None` picks the one matching the medium's address width
    pub kind: Option<ImageKind>,
}

impl<'a> ImageSpec<'a> {
    /// Application image loaded at `load_address`
    pub fn application(data: &'a [u8], entry_point: u32, load_address: u32) -> Self {
        Self {
            data,
            entry_point,
            load_address,
            reserved: 0,
            kind: None,
        }
    }

    /// First-stage loader image with the boot ROM defaults
    ///
    /// Runs from internal RAM at 0x20 with its entry point at 0x100; the
    /// reserved word asks the boot ROM for prescaler 0x31 and fast read.
    pub fn first_stage(data: &'a [u8]) -> Self {
        Self {
            data,
            entry_point: 0x100,
            load_address: 0x20,
            reserved: ReadOptions {
                prescaler: 0x31,
                fast_read: true,
            }
            .to_word(),
            kind: None,
        }
    }
}

/// Write a header at `header_offset` and the image right after it
///
/// See [`program_image_with`].
pub fn program_image<T: Transport>(
    handle: &mut DeviceHandle<T>,
    header_offset: u32,
    image: &ImageSpec<'_>,
) -> Result<BootHeader> {
    program_image_with(handle, header_offset, image, &mut NoProgress)
}

/// Write a header at `header_offset` and the image right after it
///
/// The header occupies [`header_span`] bytes so the image starts on a page
/// boundary. The covering range is erased, the image is written and
/// verified, and only then is the header written and verified, so a failed
/// transfer never leaves a header that a later boot would trust.
pub fn program_image_with<T: Transport>(
    handle: &mut DeviceHandle<T>,
    header_offset: u32,
    image: &ImageSpec<'_>,
    progress: &mut dyn Progress,
) -> Result<BootHeader> {
    if image.data.is_empty() {
        return Err(Error::EmptyImage);
    }

    let span = header_span(handle.params().page_size);
    let image_size = u32::try_from(image.data.len()).map_err(|_| Error::SizeOverflow)?;
    let total = span.checked_add(image_size).ok_or(Error::SizeOverflow)?;
    if !handle.params().is_valid_range(header_offset, total as usize) {
        log::error!(
            "Image of {} bytes at 0x{:06X} exceeds device capacity of {} bytes",
            image_size,
            header_offset,
            handle.capacity()
        );
        return Err(Error::SizeOverflow);
    }

    let source_offset = header_offset + span;
    let kind = image
        .kind
        .unwrap_or_else(|| ImageKind::for_width(handle.params().address_width));
    let header = BootHeader::new(
        kind.magic(),
        image.entry_point,
        image_size,
        image.reserved,
        source_offset,
        image.load_address,
    );

    handle.erase_range_with(header_offset, total, progress)?;

    handle.write_range_with(source_offset, image.data, progress)?;
    handle.verify_range_with(source_offset, image.data, progress)?;

    let bytes = header.to_bytes();
    handle.write_range(header_offset, &bytes)?;
    handle.verify_range(header_offset, &bytes)?;

    log::info!(
        "Wrote {} byte image at 0x{:06X} (header at 0x{:06X}, magic 0x{:08X})",
        image_size,
        source_offset,
        header_offset,
        header.magic()
    );
    Ok(header)
}

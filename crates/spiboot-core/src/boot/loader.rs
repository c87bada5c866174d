//! Boot loader state machine

use super::{BootHeader, ImageKind, HEADER_LEN};
use crate::error::{Error, Result};
use crate::flash::DeviceHandle;
use crate::transport::Transport;

/// Destination for a loaded image: a RAM window starting at `base`
pub struct LoadRegion<'a> {
    base: u32,
    mem: &'a mut [u8],
}

impl<'a> LoadRegion<'a> {
    /// Region of `mem.len()` bytes mapped at `base`
    pub fn new(base: u32, mem: &'a mut [u8]) -> Self {
        Self { base, mem }
    }

    /// Address of the first byte
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size of the region in bytes
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    /// Returns true if the region has no bytes
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    /// Returns true if `[addr, addr + len)` lies inside the region
    pub fn contains(&self, addr: u32, len: u32) -> bool {
        self.offset_of(addr, len).is_some()
    }

    fn offset_of(&self, addr: u32, len: u32) -> Option<usize> {
        let offset = addr.checked_sub(self.base)? as usize;
        let end = offset.checked_add(len as usize)?;
        (end <= self.mem.len()).then_some(offset)
    }

    /// Bytes backing `[addr, addr + len)`, or [`Error::SizeOverflow`]
    pub fn slice_mut(&mut self, addr: u32, len: u32) -> Result<&mut [u8]> {
        let offset = self.offset_of(addr, len).ok_or(Error::SizeOverflow)?;
        Ok(&mut self.mem[offset..offset + len as usize])
    }

    /// The whole region
    pub fn as_slice(&self) -> &[u8] {
        self.mem
    }
}

/// A successfully loaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootImage {
    /// Address to transfer control to
    pub entry_point: u32,
    /// The validated header
    pub header: BootHeader,
    /// Variant from the magic tag
    pub kind: ImageKind,
}

/// Loader progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// Nothing done yet
    Start,
    /// Next step reads the header
    ReadHeader,
    /// Header passed the magic check
    Valid(BootHeader, ImageKind),
    /// Header failed the magic check
    Invalid(Error),
    /// Next step copies the image
    ReadImage(BootHeader, ImageKind),
    /// Image loaded, entry point available
    Done(BootImage),
    /// Boot attempt abandoned
    Abort(Error),
}

impl LoaderState {
    /// Returns true for `Done` and `Abort`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Abort(_))
    }
}

/// Read the raw header at `offset`
pub fn read_header<T: Transport>(handle: &mut DeviceHandle<T>, offset: u32) -> Result<BootHeader> {
    let mut buf = [0u8; HEADER_LEN];
    handle.read(offset, &mut buf)?;
    BootHeader::parse(&buf)
}

/// Loads the image described by the header at a fixed offset
///
/// `START -> READ_HEADER -> VALID -> READ_IMAGE -> DONE`, or
/// `READ_HEADER -> INVALID -> ABORT` when the magic tag is rejected. The
/// destination region is only written in `READ_IMAGE`.
pub struct BootLoader<'h, 'r, T: Transport> {
    handle: &'h mut DeviceHandle<T>,
    header_offset: u32,
    region: LoadRegion<'r>,
    state: LoaderState,
}

impl<'h, 'r, T: Transport> BootLoader<'h, 'r, T> {
    /// Create a loader for the header at `header_offset`
    pub fn new(handle: &'h mut DeviceHandle<T>, header_offset: u32, region: LoadRegion<'r>) -> Self {
        Self {
            handle,
            header_offset,
            region,
            state: LoaderState::Start,
        }
    }

    /// Current state
    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    /// The destination region
    pub fn region(&self) -> &LoadRegion<'r> {
        &self.region
    }

    /// Advance by one state
    pub fn step(&mut self) -> &LoaderState {
        let state = self.state;
        self.state = match state {
            LoaderState::Start => LoaderState::ReadHeader,
            LoaderState::ReadHeader => match read_header(self.handle, self.header_offset) {
                Ok(header) => match header.validate() {
                    Ok(kind) => {
                        log::info!(
                            "Boot header at 0x{:06X}: magic 0x{:08X}, {} bytes at 0x{:06X} -> 0x{:08X}",
                            self.header_offset,
                            header.magic(),
                            header.image_size(),
                            header.source_offset(),
                            header.load_address()
                        );
                        LoaderState::Valid(header, kind)
                    }
                    Err(e) => {
                        log::warn!(
                            "Invalid boot header at 0x{:06X}: magic 0x{:08X}",
                            self.header_offset,
                            header.magic()
                        );
                        LoaderState::Invalid(e)
                    }
                },
                Err(e) => LoaderState::Abort(e),
            },
            LoaderState::Valid(header, kind) => match self.check_ranges(&header) {
                Ok(()) => LoaderState::ReadImage(header, kind),
                Err(e) => LoaderState::Abort(e),
            },
            LoaderState::Invalid(e) => LoaderState::Abort(e),
            LoaderState::ReadImage(header, kind) => match self.copy_image(&header) {
                Ok(()) => LoaderState::Done(BootImage {
                    entry_point: header.entry_point(),
                    header,
                    kind,
                }),
                Err(e) => LoaderState::Abort(e),
            },
            terminal @ (LoaderState::Done(_) | LoaderState::Abort(_)) => terminal,
        };
        &self.state
    }

    /// Step until `Done` or `Abort`
    pub fn run(mut self) -> Result<BootImage> {
        loop {
            match *self.step() {
                LoaderState::Done(image) => {
                    log::info!("Image loaded, entry point 0x{:08X}", image.entry_point);
                    return Ok(image);
                }
                LoaderState::Abort(e) => return Err(e),
                _ => {}
            }
        }
    }

    fn check_ranges(&self, header: &BootHeader) -> Result<()> {
        let size = header.image_size();
        if !self
            .handle
            .params()
            .is_valid_range(header.source_offset(), size as usize)
        {
            log::warn!(
                "Image 0x{:06X}+{} exceeds device capacity",
                header.source_offset(),
                size
            );
            return Err(Error::SizeOverflow);
        }
        if !self.region.contains(header.load_address(), size) {
            log::warn!(
                "Image 0x{:08X}+{} does not fit the load region at 0x{:08X}+{}",
                header.load_address(),
                size,
                self.region.base(),
                self.region.len()
            );
            return Err(Error::SizeOverflow);
        }
        Ok(())
    }

    fn copy_image(&mut self, header: &BootHeader) -> Result<()> {
        let dest = self
            .region
            .slice_mut(header.load_address(), header.image_size())?;
        self.handle.read(header.source_offset(), dest)
    }
}

/// Load the image whose header sits at `header_offset` into `region`
pub fn load_image<T: Transport>(
    handle: &mut DeviceHandle<T>,
    header_offset: u32,
    region: LoadRegion<'_>,
) -> Result<BootImage> {
    BootLoader::new(handle, header_offset, region).run()
}

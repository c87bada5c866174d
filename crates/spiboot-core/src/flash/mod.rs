//! Device-level memory operations
//!
//! This module provides the device handle and the page-aware write,
//! sector-aware erase and read-back verify operations built on the
//! protocol engine.

mod erase;
mod handle;
mod progress;
mod verify;
mod write;

pub use erase::{plan_erase, EraseKind, ErasePlan, EraseStep};
pub use handle::{DeviceConfig, DeviceHandle};
pub use progress::{NoProgress, Progress};
pub use write::{page_chunks, PageChunk, PageChunks};

/// The erased value for flash memory (all bits set)
pub const ERASED_VALUE: u8 = 0xFF;

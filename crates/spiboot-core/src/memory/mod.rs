//! Memory parameter registry
//!
//! Geometry descriptors for the supported memory parts, the per-class
//! command profiles, and identification of an attached part.

mod params;
mod profile;
mod registry;

pub use params::{DeviceClass, MemoryParams};
pub use profile::{CommandProfile, OpcodeSet, Operation};
pub use registry::{detect, find_by_id, has_id, KnownPart, KNOWN_PARTS};

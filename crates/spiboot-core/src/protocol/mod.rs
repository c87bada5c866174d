//! Command protocol engine
//!
//! This module maps logical operations onto wire transactions for the
//! active command profile, and implements status polling.

mod engine;

pub use engine::*;

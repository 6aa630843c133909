//! Core types and utilities for coin-column recognition.
//!
//! This crate is intentionally small: rectangle geometry, the fixed six-slot
//! layout, grayscale patch operations, and the per-slot result types shared
//! by the detector, matcher, and live-session crates. It does *not* contain
//! any detection or matching logic.

mod layout;
mod logger;
pub mod ops;
mod rect;
mod result;

pub use layout::{Slot, SlotLayout, SLOT_COUNT};
pub use rect::RectF;
pub use result::{invert_sides, CoinFace, CoinResult, LineValue, Reading, ReadingError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

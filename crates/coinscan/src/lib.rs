//! Main entry point crate for six-coin column recognition.
//!
//! An image (photo or camera frame) goes through region detection, a cheap
//! presence gate, calibrated descriptor matching, and consensus, producing a
//! six-slot classification the symbolic layer can consume. For camera feeds,
//! [`live::LiveSession`] adds temporal stabilization on top of the same
//! pipeline.
//!
//! The submodules re-export the underlying crates; the root holds the
//! high-level helpers most callers need:
//!
//! - [`detect_coins`] — contour-based region detection on a free-form photo;
//! - [`classify_regions`] — one-shot classification of six regions;
//! - [`calibrate_profile`] — build a reference template set from samples.

pub mod core {
    pub use coinscan_core::*;
}

pub mod detect {
    pub use coinscan_detect::*;
}

pub mod matching {
    pub use coinscan_match::*;
}

pub mod live {
    pub use coinscan_live::*;
}

mod pipeline;
mod store;

pub use pipeline::{
    calibrate_profile, calibrations_for, classify_regions, classify_with_templates, detect_coins,
    detect_coins_with, gray_image_from_slice, matcher_for, PipelineError,
};
pub use store::FsTemplateStore;

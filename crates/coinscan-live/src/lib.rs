//! Live-frame stabilization.
//!
//! A camera feed produces noisy single-frame classifications by design; this
//! crate turns them into a stable reading. The lock state machine gates the
//! expensive matching pipeline on a streak of quality frames, a smoothing
//! window majority-votes decisive results per slot, and [`LiveSession`]
//! wires it all to a worker thread with frame-drop backpressure: an
//! overloaded device drops frames, it never queues them.

mod reliability;
mod session;
mod smoother;
mod stabilizer;

pub use reliability::{is_reliable_reading, MIN_MEAN_CONFIDENCE, MIN_SLOT_CONFIDENCE};
pub use session::{LiveSession, SessionConfig, SessionSnapshot, SlotObservation};
pub use smoother::{resolve_smoothed_scores, ResultSmoother};
pub use stabilizer::{FrameAssessment, LockState, StabilizerConfig, TemporalStabilizer};

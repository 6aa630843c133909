//! Live detection session.
//!
//! Frames arrive push-based at sensor rate and must never block the capture
//! path: `handle_frame` only checks a throttle and a reentrancy flag, then
//! hands the frame to a dedicated worker. Frames arriving too early or while
//! a detection is in flight are dropped, never queued. All stabilizer and
//! smoothing state lives on the worker (single writer); observers read a
//! last-value-wins snapshot.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::GrayImage;
use log::debug;

use coinscan_core::{invert_sides, CoinResult, RectF, SlotLayout, SLOT_COUNT};
use coinscan_detect::{
    evaluate_region, jittered_slot_candidates, slot_regions, slot_regions_in_view,
    PresenceCalibration, PresenceMetrics, RegionQuality,
};
use coinscan_match::CoinMatcher;

use crate::reliability::is_reliable_reading;
use crate::smoother::ResultSmoother;
use crate::stabilizer::{FrameAssessment, LockState, StabilizerConfig, TemporalStabilizer};

/// Live-session tuning.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Minimum interval between accepted frames.
    pub min_interval: Duration,
    pub layout: SlotLayout,
    pub gate: PresenceCalibration,
    pub stabilizer: StabilizerConfig,
    /// Smoothing window size and the samples needed before it takes over.
    pub window_size: usize,
    pub min_samples: usize,
    /// Geometric jitter applied to match-time candidate crops, in pixels.
    pub jitter_px: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(150),
            layout: SlotLayout::default(),
            gate: PresenceCalibration::default(),
            stabilizer: StabilizerConfig::default(),
            window_size: 8,
            min_samples: 4,
            jitter_px: 16.0,
        }
    }
}

/// One slot as seen by the most recent frame, for overlay drawing.
#[derive(Clone, Copy, Debug)]
pub struct SlotObservation {
    pub position: u8,
    pub rect_norm: RectF,
    pub quality: RegionQuality,
}

/// Last-value-wins outputs of the session.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub detections: Vec<SlotObservation>,
    /// Smoothed per-slot results; empty until the stabilizer locks.
    pub results: Vec<CoinResult>,
    pub status: String,
    pub lock_state: LockState,
    pub suggest_torch: bool,
    /// The current results pass the whole-reading reliability check.
    pub reliable: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            detections: Vec::new(),
            results: Vec::new(),
            status: "scanning for coins".to_owned(),
            lock_state: LockState::Searching,
            suggest_torch: false,
            reliable: false,
        }
    }
}

enum Command {
    Frame { image: GrayImage, epoch: u64 },
    SetMatcher(Option<Arc<CoinMatcher>>),
    SetInvert(bool),
    SetViewSize(Option<(f32, f32)>),
    Reset,
    Shutdown,
}

struct Shared {
    snapshot: Mutex<SessionSnapshot>,
    enabled: AtomicBool,
    epoch: AtomicU64,
    in_flight: AtomicBool,
    last_accepted: Mutex<Option<Instant>>,
    min_interval: Duration,
}

/// Push-based live recognition session backed by one worker thread.
pub struct LiveSession {
    shared: Arc<Shared>,
    sender: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl LiveSession {
    pub fn new(config: SessionConfig) -> Self {
        let shared = Arc::new(Shared {
            snapshot: Mutex::new(SessionSnapshot::default()),
            enabled: AtomicBool::new(true),
            epoch: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
            last_accepted: Mutex::new(None),
            min_interval: config.min_interval,
        });

        let (sender, receiver) = channel();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("coinscan-live".to_owned())
            .spawn(move || {
                let mut worker = Worker::new(worker_shared, config);
                while let Ok(command) = receiver.recv() {
                    if !worker.handle(command) {
                        break;
                    }
                }
            })
            .expect("spawn live-session worker");

        Self {
            shared,
            sender,
            worker: Some(worker),
        }
    }

    /// Offer one camera frame. Never blocks; early, concurrent, or disabled
    /// frames are dropped.
    pub fn handle_frame(&self, image: GrayImage) {
        if !self.shared.enabled.load(Ordering::Acquire) {
            return;
        }
        {
            let mut last = self.shared.last_accepted.lock().unwrap();
            let now = Instant::now();
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.shared.min_interval {
                    return;
                }
            }
            if self
                .shared
                .in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            *last = Some(now);
        }

        let epoch = self.shared.epoch.load(Ordering::Acquire);
        if self.sender.send(Command::Frame { image, epoch }).is_err() {
            self.shared.in_flight.store(false, Ordering::Release);
        }
    }

    /// Current outputs (clone of the last published state).
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot.lock().unwrap().clone()
    }

    /// Install or clear the matcher for the active profile. Clears all
    /// temporal state.
    pub fn set_matcher(&self, matcher: Option<CoinMatcher>) {
        let _ = self.sender.send(Command::SetMatcher(matcher.map(Arc::new)));
    }

    pub fn set_invert_sides(&self, invert: bool) {
        let _ = self.sender.send(Command::SetInvert(invert));
    }

    /// Size of the preview view the slot layout is rendered in, when frames
    /// must be mapped through an aspect-fill preview.
    pub fn set_view_size(&self, size: Option<(f32, f32)>) {
        let _ = self.sender.send(Command::SetViewSize(size));
    }

    /// Enable or disable frame intake. In-flight work completes but its
    /// result is discarded while disabled.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Release);
    }

    /// Zero all counters and windows immediately and drop any in-flight
    /// result.
    pub fn reset(&self) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        *self.shared.snapshot.lock().unwrap() = SessionSnapshot::default();
        *self.shared.last_accepted.lock().unwrap() = None;
        let _ = self.sender.send(Command::Reset);
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Worker-side state: the single writer for all temporal counters.
struct Worker {
    shared: Arc<Shared>,
    config: SessionConfig,
    stabilizer: TemporalStabilizer,
    smoother: ResultSmoother,
    matcher: Option<Arc<CoinMatcher>>,
    invert: bool,
    view: Option<(f32, f32)>,
}

impl Worker {
    fn new(shared: Arc<Shared>, config: SessionConfig) -> Self {
        let stabilizer = TemporalStabilizer::new(config.stabilizer);
        let smoother = ResultSmoother::new(config.window_size, config.min_samples);
        Self {
            shared,
            config,
            stabilizer,
            smoother,
            matcher: None,
            invert: false,
            view: None,
        }
    }

    /// Returns `false` on shutdown.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Shutdown => return false,
            Command::SetMatcher(matcher) => {
                self.matcher = matcher;
                self.stabilizer.reset();
                self.smoother.reset();
            }
            Command::SetInvert(invert) => self.invert = invert,
            Command::SetViewSize(view) => self.view = view,
            Command::Reset => {
                self.stabilizer.reset();
                self.smoother.reset();
            }
            Command::Frame { image, epoch } => {
                let snapshot = self.process_frame(&image);
                let fresh = epoch == self.shared.epoch.load(Ordering::Acquire);
                if fresh && self.shared.enabled.load(Ordering::Acquire) {
                    *self.shared.snapshot.lock().unwrap() = snapshot;
                } else {
                    debug!("discarding result of a stale or disabled frame");
                }
                self.shared.in_flight.store(false, Ordering::Release);
            }
        }
        true
    }

    fn process_frame(&mut self, image: &GrayImage) -> SessionSnapshot {
        let regions = match self.view {
            Some((w, h)) => slot_regions_in_view(image, &self.config.layout, w, h),
            None => slot_regions(image, &self.config.layout),
        };

        let evaluations: Vec<(RegionQuality, Option<PresenceMetrics>)> = regions
            .iter()
            .map(|r| evaluate_region(&r.image, r.position, &self.config.gate))
            .collect();
        let assessment = FrameAssessment::from_evaluations(&evaluations);
        let lock_state = self.stabilizer.observe(&assessment);

        let detections: Vec<SlotObservation> = regions
            .iter()
            .zip(&evaluations)
            .map(|(region, (quality, _))| SlotObservation {
                position: region.position,
                rect_norm: region.rect_norm,
                quality: *quality,
            })
            .collect();

        let has_templates = self
            .matcher
            .as_ref()
            .map(|m| m.has_templates())
            .unwrap_or(false);

        if assessment.present_count < SLOT_COUNT {
            // The column broke up; stale history must not leak into the
            // next alignment.
            self.smoother.reset();
        }

        let mut results = Vec::new();
        if lock_state == LockState::Locked && has_templates {
            if let Some(matcher) = &self.matcher {
                let candidates =
                    jittered_slot_candidates(image, &regions, self.config.jitter_px);
                let raw = matcher.match_all(&candidates);
                results = self.smoother.add(&raw);
                if self.invert {
                    results = invert_sides(&results);
                }
            }
        }

        let reliable = !results.is_empty() && is_reliable_reading(&results);
        let status = build_status(has_templates, &assessment, lock_state, &results);

        SessionSnapshot {
            detections,
            results,
            status,
            lock_state,
            suggest_torch: self.stabilizer.suggest_torch(),
            reliable,
        }
    }
}

fn build_status(
    has_templates: bool,
    assessment: &FrameAssessment,
    lock_state: LockState,
    results: &[CoinResult],
) -> String {
    if !has_templates {
        return "no reference templates configured".to_owned();
    }
    if assessment.present_count == 0 {
        return "no coins detected".to_owned();
    }
    if assessment.present_count < SLOT_COUNT {
        return format!(
            "{} of 6 coins detected, keep adjusting",
            assessment.present_count
        );
    }
    if lock_state != LockState::Locked {
        return "six coins found, hold steady".to_owned();
    }
    if results.is_empty() {
        return "six coins found, matching".to_owned();
    }
    if results.iter().any(|r| !r.face.is_decisive()) {
        return "some coins uncertain, adjust lighting or angle".to_owned();
    }
    "all six coins recognized".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn test_config() -> SessionConfig {
        SessionConfig {
            min_interval: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn wait_for<F: Fn(&SessionSnapshot) -> bool>(
        session: &LiveSession,
        frame: &GrayImage,
        predicate: F,
    ) -> Option<SessionSnapshot> {
        for _ in 0..200 {
            session.handle_frame(frame.clone());
            thread::sleep(Duration::from_millis(5));
            let snapshot = session.snapshot();
            if predicate(&snapshot) {
                return Some(snapshot);
            }
        }
        None
    }

    #[test]
    fn frames_produce_slot_observations() {
        let session = LiveSession::new(test_config());
        let frame = GrayImage::from_pixel(480, 800, Luma([128]));

        let snapshot = wait_for(&session, &frame, |s| !s.detections.is_empty())
            .expect("snapshot after processing");
        assert_eq!(snapshot.detections.len(), 6);
        // A flat frame holds no coins.
        assert_eq!(snapshot.lock_state, LockState::Searching);
        assert!(snapshot.results.is_empty());
        assert_eq!(snapshot.status, "no reference templates configured");
    }

    #[test]
    fn reset_clears_the_snapshot_immediately() {
        let session = LiveSession::new(test_config());
        let frame = GrayImage::from_pixel(480, 800, Luma([128]));
        wait_for(&session, &frame, |s| !s.detections.is_empty()).expect("processed");

        session.reset();
        let snapshot = session.snapshot();
        assert!(snapshot.detections.is_empty());
        assert_eq!(snapshot.status, "scanning for coins");
    }

    #[test]
    fn disabled_session_ignores_frames() {
        let session = LiveSession::new(test_config());
        session.set_enabled(false);
        let frame = GrayImage::from_pixel(480, 800, Luma([128]));
        for _ in 0..5 {
            session.handle_frame(frame.clone());
        }
        thread::sleep(Duration::from_millis(50));
        assert!(session.snapshot().detections.is_empty());
    }
}

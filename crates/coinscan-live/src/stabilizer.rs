//! Lock state machine and low-light hysteresis.

use serde::{Deserialize, Serialize};

use coinscan_core::SLOT_COUNT;
use coinscan_detect::{PresenceMetrics, RegionQuality};

/// Stabilizer tuning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// Accumulated quality frames required before matching runs.
    pub lock_threshold: u32,
    /// Low-light frames required before suggesting the torch.
    pub low_light_threshold: u32,
    /// Low-light pattern: at least this many slots present...
    pub low_light_min_present: usize,
    /// ...while mean patch energy stays below this...
    pub low_light_max_energy: f32,
    /// ...and the mean quality score below this.
    pub low_light_max_quality: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            lock_threshold: 6,
            low_light_threshold: 8,
            low_light_min_present: 4,
            low_light_max_energy: 0.11,
            low_light_max_quality: 0.60,
        }
    }
}

/// Stabilizer phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LockState {
    /// Fewer than six slots are simultaneously high quality.
    Searching,
    /// Quality frames are accumulating toward the lock threshold.
    Locking,
    /// The full matching pipeline runs.
    Locked,
}

/// One frame's gate summary across the six slots.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameAssessment {
    pub present_count: usize,
    pub high_quality_count: usize,
    pub mean_energy: f32,
    pub mean_quality_score: f32,
}

impl FrameAssessment {
    /// Summarize per-slot gate evaluations.
    pub fn from_evaluations(evaluations: &[(RegionQuality, Option<PresenceMetrics>)]) -> Self {
        let present_count = evaluations
            .iter()
            .filter(|(q, _)| !matches!(q, RegionQuality::Empty))
            .count();
        let high_quality_count = evaluations
            .iter()
            .filter(|(q, _)| matches!(q, RegionQuality::High))
            .count();

        let metrics: Vec<&PresenceMetrics> =
            evaluations.iter().filter_map(|(_, m)| m.as_ref()).collect();
        let (mean_energy, mean_quality_score) = if metrics.is_empty() {
            (0.0, 0.0)
        } else {
            let n = metrics.len() as f32;
            (
                metrics.iter().map(|m| m.energy_mean).sum::<f32>() / n,
                metrics.iter().map(|m| m.quality_score()).sum::<f32>() / n,
            )
        };

        Self {
            present_count,
            high_quality_count,
            mean_energy,
            mean_quality_score,
        }
    }

    fn quality_ready(&self) -> bool {
        self.high_quality_count >= SLOT_COUNT
    }
}

/// Frame-rate-bounded state machine gating the matching pipeline.
///
/// The quality streak accumulates monotonically, resets to zero on any
/// frame that is not quality-ready, and saturates at the lock threshold.
/// All mutation happens on a single owner (the session worker).
#[derive(Clone, Debug)]
pub struct TemporalStabilizer {
    config: StabilizerConfig,
    quality_streak: u32,
    low_light: u32,
}

impl TemporalStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            quality_streak: 0,
            low_light: 0,
        }
    }

    /// Consume one frame's assessment; returns the state after the update.
    pub fn observe(&mut self, assessment: &FrameAssessment) -> LockState {
        if assessment.quality_ready() {
            self.quality_streak = (self.quality_streak + 1).min(self.config.lock_threshold);
        } else {
            self.quality_streak = 0;
        }

        let low_light_pattern = assessment.present_count >= self.config.low_light_min_present
            && assessment.high_quality_count < SLOT_COUNT
            && assessment.mean_energy < self.config.low_light_max_energy
            && assessment.mean_quality_score < self.config.low_light_max_quality;
        if low_light_pattern {
            self.low_light = (self.low_light + 1).min(self.config.low_light_threshold);
        } else {
            self.low_light = self.low_light.saturating_sub(1);
        }

        self.state()
    }

    pub fn state(&self) -> LockState {
        if self.quality_streak >= self.config.lock_threshold {
            LockState::Locked
        } else if self.quality_streak > 0 {
            LockState::Locking
        } else {
            LockState::Searching
        }
    }

    /// Advisory only: the scene looks like a dim coin column, suggest the
    /// torch. Never a hard gate.
    pub fn suggest_torch(&self) -> bool {
        self.low_light >= self.config.low_light_threshold
    }

    /// Zero all counters (profile change, view dismiss).
    pub fn reset(&mut self) {
        self.quality_streak = 0;
        self.low_light = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> FrameAssessment {
        FrameAssessment {
            present_count: 6,
            high_quality_count: 6,
            mean_energy: 0.2,
            mean_quality_score: 0.9,
        }
    }

    fn degraded() -> FrameAssessment {
        FrameAssessment {
            present_count: 4,
            high_quality_count: 3,
            mean_energy: 0.2,
            mean_quality_score: 0.7,
        }
    }

    fn dim() -> FrameAssessment {
        FrameAssessment {
            present_count: 5,
            high_quality_count: 4,
            mean_energy: 0.05,
            mean_quality_score: 0.4,
        }
    }

    #[test]
    fn six_quality_frames_reach_lock() {
        let mut stabilizer = TemporalStabilizer::new(StabilizerConfig::default());
        assert_eq!(stabilizer.state(), LockState::Searching);
        for i in 1..=6 {
            let state = stabilizer.observe(&ready());
            if i < 6 {
                assert_eq!(state, LockState::Locking, "frame {i}");
            } else {
                assert_eq!(state, LockState::Locked);
            }
        }
        // The streak saturates; staying ready keeps the lock.
        assert_eq!(stabilizer.observe(&ready()), LockState::Locked);
    }

    #[test]
    fn one_bad_frame_resets_the_streak() {
        let mut stabilizer = TemporalStabilizer::new(StabilizerConfig::default());
        for _ in 0..5 {
            stabilizer.observe(&ready());
        }
        assert_eq!(stabilizer.observe(&degraded()), LockState::Searching);
        // Must re-accumulate the full streak.
        for i in 1..=5 {
            assert_eq!(stabilizer.observe(&ready()), LockState::Locking, "frame {i}");
        }
        assert_eq!(stabilizer.observe(&ready()), LockState::Locked);
    }

    #[test]
    fn low_light_suggestion_has_hysteresis() {
        let mut stabilizer = TemporalStabilizer::new(StabilizerConfig::default());
        for _ in 0..7 {
            stabilizer.observe(&dim());
            assert!(!stabilizer.suggest_torch());
        }
        stabilizer.observe(&dim());
        assert!(stabilizer.suggest_torch());
        // One bright frame decrements but does not clear the suggestion
        // counter all the way.
        stabilizer.observe(&ready());
        assert!(!stabilizer.suggest_torch());
        stabilizer.observe(&dim());
        assert!(stabilizer.suggest_torch());
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut stabilizer = TemporalStabilizer::new(StabilizerConfig::default());
        for _ in 0..8 {
            stabilizer.observe(&dim());
        }
        stabilizer.reset();
        assert_eq!(stabilizer.state(), LockState::Searching);
        assert!(!stabilizer.suggest_torch());
    }

    #[test]
    fn assessment_summarizes_gate_outputs() {
        use coinscan_detect::PresenceMetrics;
        let metrics = PresenceMetrics {
            energy_mean: 0.04,
            ring_ratio: 0.3,
            centroid_offset: 0.05,
        };
        let evaluations = vec![
            (RegionQuality::High, Some(metrics)),
            (RegionQuality::Present, Some(metrics)),
            (RegionQuality::Empty, None),
        ];
        let assessment = FrameAssessment::from_evaluations(&evaluations);
        assert_eq!(assessment.present_count, 2);
        assert_eq!(assessment.high_quality_count, 1);
        assert!((assessment.mean_energy - 0.04).abs() < 1e-6);
    }
}

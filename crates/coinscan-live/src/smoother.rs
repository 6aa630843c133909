//! Per-slot smoothing of decisive results over a sliding window.

use std::collections::HashMap;
use std::collections::VecDeque;

use coinscan_core::{CoinFace, CoinResult};

/// Winning-side delta below which, combined with a weak confidence, the
/// smoothed answer is demoted to uncertain.
const MIN_SCORE_DELTA: f64 = 0.15;
const MIN_SMOOTHED_CONFIDENCE: f64 = 0.58;

/// Resolve accumulated per-side confidence sums into a smoothed answer.
///
/// The emitted confidence is the winning share of the total. The answer is
/// demoted to uncertain only when the side delta (normalized by the winning
/// sum) is small *and* the confidence is weak; a consistent small majority
/// is still a majority.
pub fn resolve_smoothed_scores(front_sum: f64, back_sum: f64) -> Option<(CoinFace, f64)> {
    let total = front_sum + back_sum;
    if !(total > 0.0) {
        return None;
    }
    let winning = front_sum.max(back_sum);
    let confidence = winning / total;
    let delta = (front_sum - back_sum).abs() / winning.max(f64::MIN_POSITIVE);

    if delta < MIN_SCORE_DELTA && confidence < MIN_SMOOTHED_CONFIDENCE {
        return Some((CoinFace::Uncertain, confidence));
    }
    let face = if front_sum > back_sum {
        CoinFace::Front
    } else {
        CoinFace::Back
    };
    Some((face, confidence))
}

/// Sliding-window smoother for the six slots.
///
/// Only decisive (front/back) results enter the window; uncertain frames
/// neither help nor hurt an established majority. Until a slot has seen
/// `min_samples` decisive results, its per-frame result passes through
/// unchanged.
#[derive(Clone, Debug)]
pub struct ResultSmoother {
    window_size: usize,
    min_samples: usize,
    history: HashMap<u8, VecDeque<(CoinFace, f64)>>,
}

impl ResultSmoother {
    pub fn new(window_size: usize, min_samples: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            min_samples: min_samples.max(1),
            history: HashMap::new(),
        }
    }

    /// Feed one frame's results, returning the smoothed view.
    pub fn add(&mut self, results: &[CoinResult]) -> Vec<CoinResult> {
        results
            .iter()
            .map(|result| {
                if result.face.is_decisive() {
                    let window = self.history.entry(result.position).or_default();
                    window.push_back((result.face, result.confidence));
                    while window.len() > self.window_size {
                        window.pop_front();
                    }
                }
                self.smoothed(result)
            })
            .collect()
    }

    /// Drop all accumulated history.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    fn smoothed(&self, fallback: &CoinResult) -> CoinResult {
        let Some(window) = self.history.get(&fallback.position) else {
            return *fallback;
        };
        if window.len() < self.min_samples {
            return *fallback;
        }

        let mut front_sum = 0.0;
        let mut back_sum = 0.0;
        for &(face, confidence) in window {
            match face {
                CoinFace::Front => front_sum += confidence,
                CoinFace::Back => back_sum += confidence,
                CoinFace::Uncertain | CoinFace::Invalid => {}
            }
        }

        match resolve_smoothed_scores(front_sum, back_sum) {
            Some((face, confidence)) => fallback.with_face(face, confidence),
            None => *fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clear_majority_resolves_to_its_side() {
        let (face, confidence) = resolve_smoothed_scores(0.57, 0.43).unwrap();
        assert_eq!(face, CoinFace::Front);
        assert_relative_eq!(confidence, 0.57);
    }

    #[test]
    fn dead_heat_resolves_to_uncertain() {
        let (face, confidence) = resolve_smoothed_scores(0.50, 0.50).unwrap();
        assert_eq!(face, CoinFace::Uncertain);
        assert_relative_eq!(confidence, 0.50);
    }

    #[test]
    fn zero_evidence_resolves_to_nothing() {
        assert!(resolve_smoothed_scores(0.0, 0.0).is_none());
    }

    #[test]
    fn smoother_flips_a_noisy_minority_frame() {
        let mut smoother = ResultSmoother::new(8, 4);
        // Five consistent front frames...
        for _ in 0..5 {
            smoother.add(&[CoinResult::new(1, CoinFace::Front, 0.9)]);
        }
        // ...then one confident back outlier.
        let smoothed = smoother.add(&[CoinResult::new(1, CoinFace::Back, 0.9)]);
        assert_eq!(smoothed[0].face, CoinFace::Front);
    }

    #[test]
    fn results_pass_through_until_minimum_samples() {
        let mut smoother = ResultSmoother::new(8, 4);
        let first = smoother.add(&[CoinResult::new(2, CoinFace::Back, 0.8)]);
        assert_eq!(first[0].face, CoinFace::Back);
        let second = smoother.add(&[CoinResult::new(2, CoinFace::Uncertain, 0.4)]);
        // Only one decisive sample so far: the uncertain frame passes
        // through unchanged.
        assert_eq!(second[0].face, CoinFace::Uncertain);
    }

    #[test]
    fn window_is_bounded() {
        let mut smoother = ResultSmoother::new(3, 1);
        for _ in 0..10 {
            smoother.add(&[CoinResult::new(1, CoinFace::Front, 0.9)]);
        }
        let window = smoother.history.get(&1).unwrap();
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn reset_clears_history() {
        let mut smoother = ResultSmoother::new(8, 1);
        smoother.add(&[CoinResult::new(1, CoinFace::Front, 0.9)]);
        smoother.reset();
        assert!(smoother.history.is_empty());
    }
}

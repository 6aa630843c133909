use serde::{Deserialize, Serialize};

use crate::layout::SLOT_COUNT;

/// Binary line value derived from the visible coin face.
///
/// The mapping of six line values to a named reading lives outside this
/// engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineValue {
    Yin,
    Yang,
}

/// Classified face of one coin token.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinFace {
    Front,
    Back,
    Uncertain,
    Invalid,
}

impl CoinFace {
    /// A decisive classification names one physical face.
    #[inline]
    pub fn is_decisive(self) -> bool {
        matches!(self, CoinFace::Front | CoinFace::Back)
    }

    /// Ordering used when picking the best of several attempts:
    /// decisive < uncertain < invalid.
    #[inline]
    pub fn rank(self) -> u8 {
        match self {
            CoinFace::Front | CoinFace::Back => 0,
            CoinFace::Uncertain => 1,
            CoinFace::Invalid => 2,
        }
    }

    /// Line value carried by this face. Indecisive faces default to yang.
    #[inline]
    pub fn line_value(self) -> LineValue {
        match self {
            CoinFace::Front => LineValue::Yin,
            CoinFace::Back | CoinFace::Uncertain | CoinFace::Invalid => LineValue::Yang,
        }
    }
}

/// Per-slot classification output.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoinResult {
    /// Line position, 1..=6 bottom-to-top.
    pub position: u8,
    pub line: LineValue,
    pub face: CoinFace,
    /// Always clamped to [0, 1].
    pub confidence: f64,
}

impl CoinResult {
    pub fn new(position: u8, face: CoinFace, confidence: f64) -> Self {
        Self {
            position,
            line: face.line_value(),
            face,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Replace face and confidence, keeping the line value consistent for
    /// decisive faces.
    pub fn with_face(mut self, face: CoinFace, confidence: f64) -> Self {
        self.face = face;
        self.confidence = confidence.clamp(0.0, 1.0);
        if face.is_decisive() {
            self.line = face.line_value();
        }
        self
    }
}

/// Swap front and back on every decisive result, line values following.
///
/// Used when the physical coin set is laid out with inverted orientation
/// relative to the calibrated reference.
pub fn invert_sides(results: &[CoinResult]) -> Vec<CoinResult> {
    results
        .iter()
        .map(|r| match r.face {
            CoinFace::Front => r.with_face(CoinFace::Back, r.confidence),
            CoinFace::Back => r.with_face(CoinFace::Front, r.confidence),
            CoinFace::Uncertain | CoinFace::Invalid => *r,
        })
        .collect()
}

/// A complete six-slot result, validated on construction.
///
/// The symbolic layer only ever consumes full readings; a partial result is
/// represented by not constructing a `Reading` at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading([CoinResult; SLOT_COUNT]);

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum ReadingError {
    #[error("expected {SLOT_COUNT} results, got {got}")]
    WrongCount { got: usize },
    #[error("positions must be distinct values 1..=6")]
    BadPositions,
}

impl Reading {
    /// Build a reading from per-slot results in any order.
    pub fn from_results(mut results: Vec<CoinResult>) -> Result<Self, ReadingError> {
        if results.len() != SLOT_COUNT {
            return Err(ReadingError::WrongCount {
                got: results.len(),
            });
        }
        results.sort_by_key(|r| r.position);
        let positions: Vec<u8> = results.iter().map(|r| r.position).collect();
        if positions != [1, 2, 3, 4, 5, 6] {
            return Err(ReadingError::BadPositions);
        }
        let array: [CoinResult; SLOT_COUNT] =
            results.try_into().map_err(|_| ReadingError::BadPositions)?;
        Ok(Reading(array))
    }

    /// Results ordered by position 1..=6.
    pub fn results(&self) -> &[CoinResult; SLOT_COUNT] {
        &self.0
    }

    /// Line values ordered bottom-to-top.
    pub fn lines(&self) -> [LineValue; SLOT_COUNT] {
        std::array::from_fn(|i| self.0[i].line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(position: u8, face: CoinFace, confidence: f64) -> CoinResult {
        CoinResult::new(position, face, confidence)
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(result(1, CoinFace::Front, 1.7).confidence, 1.0);
        assert_eq!(result(1, CoinFace::Front, -0.3).confidence, 0.0);
    }

    #[test]
    fn invert_sides_swaps_decisive_results_only() {
        let results = vec![
            result(1, CoinFace::Front, 0.9),
            result(2, CoinFace::Back, 0.8),
            result(3, CoinFace::Uncertain, 0.5),
        ];
        let inverted = invert_sides(&results);
        assert_eq!(inverted[0].face, CoinFace::Back);
        assert_eq!(inverted[0].line, LineValue::Yang);
        assert_eq!(inverted[1].face, CoinFace::Front);
        assert_eq!(inverted[1].line, LineValue::Yin);
        assert_eq!(inverted[2].face, CoinFace::Uncertain);
    }

    #[test]
    fn reading_requires_six_distinct_positions() {
        let six: Vec<CoinResult> = (1..=6)
            .map(|p| result(p, CoinFace::Front, 0.9))
            .collect();
        assert!(Reading::from_results(six.clone()).is_ok());

        let mut dup = six.clone();
        dup[5].position = 1;
        assert_eq!(
            Reading::from_results(dup),
            Err(ReadingError::BadPositions)
        );

        assert_eq!(
            Reading::from_results(six[..5].to_vec()),
            Err(ReadingError::WrongCount { got: 5 })
        );
    }

    #[test]
    fn reading_sorts_results_by_position() {
        let shuffled = vec![
            result(4, CoinFace::Back, 0.8),
            result(1, CoinFace::Front, 0.9),
            result(6, CoinFace::Front, 0.7),
            result(2, CoinFace::Back, 0.8),
            result(5, CoinFace::Front, 0.9),
            result(3, CoinFace::Back, 0.6),
        ];
        let reading = Reading::from_results(shuffled).unwrap();
        let positions: Vec<u8> = reading.results().iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5, 6]);
    }
}

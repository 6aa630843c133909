//! Consensus across classification attempts and representation paths.

use coinscan_core::CoinFace;

use crate::classify::Classification;

/// Decisive attempts below this confidence are downgraded to uncertain
/// before they may contribute evidence.
pub const MIN_DECISIVE_CONFIDENCE: f64 = 0.62;

/// Margin (normalized by total evidence) the winning side must reach.
const MIN_EVIDENCE_MARGIN: f64 = 0.12;

/// Number of attempts that must support the winning side.
const MIN_SUPPORT_COUNT: usize = 2;

/// Downgrade an unreliable decisive attempt to uncertain.
pub fn reliability_adjusted(result: Classification) -> Classification {
    if result.face.is_decisive() && result.confidence < MIN_DECISIVE_CONFIDENCE {
        return Classification::new(CoinFace::Uncertain, result.confidence);
    }
    result
}

/// Of two attempts, prefer the better-ranked face, then the higher
/// confidence. Ties go to `b` so later attempts can displace earlier ones.
pub(crate) fn prefer(a: Classification, b: Classification) -> Classification {
    match a.face.rank().cmp(&b.face.rank()) {
        std::cmp::Ordering::Less => a,
        std::cmp::Ordering::Greater => b,
        std::cmp::Ordering::Equal => {
            if b.confidence >= a.confidence {
                b
            } else {
                a
            }
        }
    }
}

/// Resolve confidence-weighted evidence from several attempts on one slot.
///
/// Declares a side only when the margin between the evidence sums clears
/// 12% of the total and at least two attempts back the winner; the declared
/// confidence is the winning share of the total.
pub fn resolve_candidate_evidence(
    front_evidence: f64,
    back_evidence: f64,
    front_count: usize,
    back_count: usize,
) -> Classification {
    let total = front_evidence + back_evidence;
    if !(total > 0.0) {
        return Classification::INVALID;
    }

    let (face, dominant, support) = if front_evidence >= back_evidence {
        (CoinFace::Front, front_evidence, front_count)
    } else {
        (CoinFace::Back, back_evidence, back_count)
    };
    let confidence = dominant / total;
    let margin = (front_evidence - back_evidence).abs() / total;

    if margin < MIN_EVIDENCE_MARGIN || support < MIN_SUPPORT_COUNT {
        return Classification::new(CoinFace::Uncertain, confidence);
    }
    Classification::new(face, confidence)
}

/// Merge the descriptor-path and embedding-path results for one candidate.
///
/// Agreement averages the confidences. Disagreement defers to the embedding
/// path at a 0.10 confidence advantage and to the descriptor path at 0.14
/// (the embedding is the stronger witness); anything closer is uncertain.
/// A decisive descriptor with no embedding support must be very confident
/// on its own.
pub fn merge_paths(descriptor: Classification, embedding: Classification) -> Classification {
    let descriptor_decisive = descriptor.face.is_decisive();
    let embedding_decisive = embedding.face.is_decisive();

    if descriptor_decisive && embedding_decisive {
        if descriptor.face == embedding.face {
            return Classification::new(
                descriptor.face,
                (descriptor.confidence + embedding.confidence) / 2.0,
            );
        }
        if embedding.confidence - descriptor.confidence >= 0.10 {
            return embedding;
        }
        if descriptor.confidence - embedding.confidence >= 0.14 {
            return descriptor;
        }
        return Classification::new(
            CoinFace::Uncertain,
            descriptor.confidence.max(embedding.confidence),
        );
    }

    if descriptor_decisive {
        return if descriptor.confidence >= 0.82 {
            descriptor
        } else {
            Classification::new(CoinFace::Uncertain, descriptor.confidence)
        };
    }

    if embedding_decisive {
        return embedding;
    }

    prefer(descriptor, embedding)
}

/// Errors returned by the contour-based coin detector.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("image has zero size")]
    EmptyImage,
    #[error("not enough coin candidates (found {found}, need 6)")]
    NotEnoughCandidates { found: usize },
}

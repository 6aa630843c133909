//! Opaque embedding contract.
//!
//! Platform descriptor primitives (fixed-size feature prints with a distance
//! function) plug in behind [`Embedder`]; the engine never looks inside an
//! [`Embedding`]. A failed embed is `None`, treated by callers as "this
//! attempt produced no candidate".

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::descriptor::{coin_descriptor, cosine_similarity};

/// Opaque vector handle produced by an [`Embedder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

/// Injected descriptor primitive: embed an image, measure distances.
///
/// Distances must be nonnegative; smaller means more similar.
pub trait Embedder: Send + Sync {
    fn embed(&self, image: &GrayImage) -> Option<Embedding>;
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32;
}

/// Built-in embedder backed by the local gradient descriptor.
///
/// Keeps the embedding path functional without any platform primitive; the
/// distance is cosine distance, so it lives in [0, 2].
#[derive(Clone, Copy, Debug, Default)]
pub struct GradientEmbedder;

impl Embedder for GradientEmbedder {
    fn embed(&self, image: &GrayImage) -> Option<Embedding> {
        coin_descriptor(image).map(Embedding)
    }

    fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        if a.0.len() != b.0.len() {
            return f32::MAX;
        }
        (1.0 - cosine_similarity(&a.0, &b.0)).max(0.0)
    }
}

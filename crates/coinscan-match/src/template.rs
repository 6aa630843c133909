//! Reference template sets and the opaque blob round-trip.

use serde::{Deserialize, Serialize};

use crate::embed::Embedding;

/// Reference data for one physical coin face.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceTemplates {
    pub descriptors: Vec<Vec<f32>>,
    pub embeddings: Vec<Embedding>,
}

impl FaceTemplates {
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.embeddings.is_empty()
    }
}

/// Calibrated reference set for one coin profile.
///
/// Immutable after creation; regenerating from new sample images is the only
/// way to change it. Persisted as an opaque blob with a creation timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTemplateSet {
    pub front: FaceTemplates,
    pub back: FaceTemplates,
    /// Creation time, seconds since the Unix epoch.
    pub created_unix_s: u64,
}

impl ReferenceTemplateSet {
    /// Both faces carry at least one local descriptor.
    pub fn has_descriptors(&self) -> bool {
        !self.front.descriptors.is_empty() && !self.back.descriptors.is_empty()
    }

    /// Both faces carry at least one embedding.
    pub fn has_embeddings(&self) -> bool {
        !self.front.embeddings.is_empty() && !self.back.embeddings.is_empty()
    }

    /// Serialize to the opaque storage blob.
    pub fn to_blob(&self) -> Result<Vec<u8>, TemplateStoreError> {
        serde_json::to_vec(self).map_err(|e| TemplateStoreError::Corrupt(e.to_string()))
    }

    /// Deserialize from the opaque storage blob.
    pub fn from_blob(bytes: &[u8]) -> Result<Self, TemplateStoreError> {
        serde_json::from_slice(bytes).map_err(|e| TemplateStoreError::Corrupt(e.to_string()))
    }
}

/// Persistent profile store, consumed as an abstract collaborator.
///
/// The engine only requires a bytes round-trip keyed by profile id; it does
/// not define the storage medium.
pub trait TemplateStore {
    fn load(&self, profile_id: &str) -> Result<Vec<u8>, TemplateStoreError>;
    fn save(&self, profile_id: &str, blob: &[u8]) -> Result<(), TemplateStoreError>;
}

#[derive(thiserror::Error, Debug)]
pub enum TemplateStoreError {
    #[error("no template set stored for profile {0:?}")]
    NotFound(String),
    #[error("template store I/O failed: {0}")]
    Io(String),
    #[error("template blob is corrupt: {0}")]
    Corrupt(String),
}

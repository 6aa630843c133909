//! Filesystem-backed template store.

use std::fs;
use std::path::PathBuf;

use coinscan_match::{TemplateStore, TemplateStoreError};

/// Stores one opaque template blob per profile under a root directory.
///
/// The blob content is owned by `coinscan-match`; this store only round-trips
/// bytes.
#[derive(Clone, Debug)]
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, profile_id: &str) -> PathBuf {
        self.root.join(format!("{profile_id}.templates.json"))
    }
}

impl TemplateStore for FsTemplateStore {
    fn load(&self, profile_id: &str) -> Result<Vec<u8>, TemplateStoreError> {
        let path = self.path_for(profile_id);
        if !path.exists() {
            return Err(TemplateStoreError::NotFound(profile_id.to_owned()));
        }
        fs::read(&path).map_err(|e| TemplateStoreError::Io(e.to_string()))
    }

    fn save(&self, profile_id: &str, blob: &[u8]) -> Result<(), TemplateStoreError> {
        fs::create_dir_all(&self.root).map_err(|e| TemplateStoreError::Io(e.to_string()))?;
        fs::write(self.path_for(profile_id), blob)
            .map_err(|e| TemplateStoreError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinscan_match::{FaceTemplates, ReferenceTemplateSet};

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTemplateStore::new(dir.path());

        let set = ReferenceTemplateSet {
            front: FaceTemplates {
                descriptors: vec![vec![1.0, 0.0]],
                embeddings: Vec::new(),
            },
            back: FaceTemplates {
                descriptors: vec![vec![0.0, 1.0]],
                embeddings: Vec::new(),
            },
            created_unix_s: 42,
        };
        store.save("default", &set.to_blob().unwrap()).unwrap();

        let blob = store.load("default").unwrap();
        assert_eq!(ReferenceTemplateSet::from_blob(&blob).unwrap(), set);

        assert!(matches!(
            store.load("missing"),
            Err(TemplateStoreError::NotFound(_))
        ));
    }
}

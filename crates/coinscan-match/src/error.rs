/// Errors from reference-set calibration.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    /// No sample image yielded a usable descriptor or embedding. Fatal for
    /// this calibration attempt; the caller must supply different images.
    #[error("no usable descriptors or embeddings from {front_samples} front and {back_samples} back samples")]
    NoUsableSamples {
        front_samples: usize,
        back_samples: usize,
    },
}

use thiserror::Error;

/// Error handling during fingerprint image analysis and ensemble model loading.
#[derive(Error, Debug)]
pub enum QualityError {
    /// The supplied image is structurally invalid.
    ///
    /// Raised before any block processing when the pixel buffer length does
    /// not match the declared dimensions, or a dimension is zero.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Analysis configuration is missing or inconsistent.
    ///
    /// The associated string names the offending parameter.
    #[error("Invalid configuration: {0}")]
    MissConfiguration(String),

    /// An error occurred while parsing an ensemble model or model-info file.
    ///
    /// The associated string provides the offending line or rule.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The model file could not be read from disk.
    #[error("Model file unreadable: {0}")]
    ModelIo(String),

    /// The model content hash does not match the expected hash.
    ///
    /// The model is rejected as a whole; no partially verified model is
    /// ever used for scoring.
    #[error("Model integrity check failed: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// A feature module failed in an unexpected way.
    ///
    /// The aggregator absorbs this into per-feature failure status; it only
    /// surfaces to callers that invoke a module directly.
    #[error("Feature computation failed: {0}")]
    FeatureCalculation(String),
}

use std::time::Duration;

use thiserror::Error;

/// Failures raised by the answer pipeline.
///
/// Startup code treats `Configuration`, `Data` and `Model` as fatal. The two
/// inference variants are per-request and are translated at the request boundary.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data error: {0}")]
    Data(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("inference timed out after {}s", .0.as_secs())]
    InferenceTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, RagError>;

//! Failure kinds of an emotion request. The HTTP layer maps each kind to a
//! status code.

use crate::detector::DetectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The body is not the expected JSON envelope or the image field is not
    /// a base64 data URL
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("Failed to decode image")]
    ImageDecode,
    #[error("emotion detection failed: {0}")]
    Detection(#[from] DetectorError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

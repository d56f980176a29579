//! Turns a raw request body into an emotion prediction: parse the JSON
//! envelope, decode the data-URL image, run the detector and pick the
//! dominant emotion of the first face.

use crate::detector::EmotionDetector;
use crate::error::AnalysisError;
use crate::protocol::{EmotionRequest, EmotionResponse};
use crate::vision;
use std::sync::Arc;
use tracing::{debug, info};

/// Request handler state shared by all HTTP workers
#[derive(Clone)]
pub struct EmotionService {
    detector: Arc<dyn EmotionDetector>,
}

impl EmotionService {
    pub fn new(detector: Arc<dyn EmotionDetector>) -> Self {
        EmotionService { detector }
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Run the full pipeline on a request body. Blocks for the duration of
    /// image decoding and model inference.
    #[tracing::instrument(skip_all, fields(body_len = body.len()))]
    pub fn analyze(&self, body: &[u8]) -> Result<EmotionResponse, AnalysisError> {
        let request: EmotionRequest = serde_json::from_slice(body)
            .map_err(|e| AnalysisError::MalformedRequest(format!("invalid JSON body: {e}")))?;
        debug!("parsed request {request:?}");

        let payload = vision::payload_from_data_url(&request.data.image)?;
        let bytes = vision::decode_base64(payload)?;
        let image = vision::decode_image(&bytes)?;
        debug!("decoded {}x{} image", image.width(), image.height());

        let faces = self.detector.detect_emotions(&image)?;
        if faces.len() > 1 {
            debug!("{} faces detected, reporting the first", faces.len());
        }

        let response = EmotionResponse::from_faces(&faces);
        info!(
            faces = faces.len(),
            emotion = %response.emotion,
            "finished serving emotion request"
        );
        Ok(response)
    }
}

use crate::detector::FaceEmotions;
use crate::emotion::{Emotion, EmotionDistribution};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Body of an emotion request: `{"data": {"image": "data:<mime>;base64,..."}}`
#[derive(Deserialize, Debug)]
pub struct EmotionRequest {
    pub data: ImagePayload,
}

/// A base 64 image, wrapped in a data URL
#[derive(Deserialize)]
pub struct ImagePayload {
    pub image: String,
}

impl Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImagePayload {{ image: <{} bytes> }}", self.image.len())
    }
}

/// Scores for the first face in the image and its dominant emotion
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EmotionResponse {
    pub predictions: EmotionDistribution,
    pub emotion: Emotion,
}

impl EmotionResponse {
    /// Report the first face verbatim. With no faces every score is zero and
    /// the emotion is neutral.
    pub fn from_faces(faces: &[FaceEmotions]) -> Self {
        match faces.first() {
            Some(face) => EmotionResponse {
                predictions: face.emotions,
                emotion: face.emotions.dominant(),
            },
            None => EmotionResponse {
                predictions: EmotionDistribution::default(),
                emotion: Emotion::Neutral,
            },
        }
    }
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub detector: String,
}

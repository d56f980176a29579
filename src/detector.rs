//! The facial emotion detection capability consumed by the service.

use crate::emotion::EmotionDistribution;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("invalid detector configuration: {0}")]
    Config(String),
    #[error("model lock poisoned by a panicked request")]
    Poisoned,
}

/// Face region in pixel coordinates of the analyzed image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// The whole frame, used when no face localisation model is loaded
    pub fn full_frame(width: u32, height: u32) -> Self {
        BoundingBox {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            confidence: 1.0,
        }
    }

    /// Build from corner coordinates `(x1, y1, x2, y2)`
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        BoundingBox {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
            confidence,
        }
    }

    /// Integer region `(x, y, width, height)` grown by `padding` on every side
    /// and clamped to a `frame_width` x `frame_height` frame. `None` if nothing
    /// of the box lies inside the frame.
    pub fn padded_region(
        &self,
        padding: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<(u32, u32, u32, u32)> {
        let pad = padding as f32;
        let x0 = (self.x - pad).floor().max(0.0);
        let y0 = (self.y - pad).floor().max(0.0);
        let x1 = (self.x + self.width + pad).ceil().min(frame_width as f32);
        let y1 = (self.y + self.height + pad).ceil().min(frame_height as f32);

        if !(x1 > x0 && y1 > y0) {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// The emotion scores for one detected face
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEmotions {
    pub region: BoundingBox,
    pub emotions: EmotionDistribution,
}

/// Locates faces in a color image and scores each one against the emotion
/// vocabulary. Faces are returned most confident first.
///
/// A detector is built once at startup and shared by every HTTP worker, so
/// implementations must be `Send + Sync`. Wrap resources that cannot be used
/// concurrently in a `Mutex`.
pub trait EmotionDetector: Send + Sync {
    fn detect_emotions(&self, image: &RgbImage) -> Result<Vec<FaceEmotions>, DetectorError>;

    /// Short human readable name, reported by the health route
    fn name(&self) -> &str;
}

//! Image handling: data-URL payloads, raster decoding and face preprocessing

use crate::detector::BoundingBox;
use crate::error::AnalysisError;
use base64::{engine::general_purpose, Engine as _};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};

/// ITU-R BT.601 luma weights, the grayscale conversion FER classifiers are
/// trained with
const LUMA_601: [f32; 3] = [0.299, 0.587, 0.114];

/// The base64 part of a `data:<mime>;base64,<payload>` string, i.e. everything
/// after the first comma
pub fn payload_from_data_url(data_url: &str) -> Result<&str, AnalysisError> {
    data_url
        .split_once(',')
        .map(|(_, payload)| payload)
        .ok_or_else(|| AnalysisError::MalformedRequest("image is not a data URL".into()))
}

/// Decode a standard-alphabet base64 string. Line breaks and other ASCII
/// whitespace are skipped.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, AnalysisError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| AnalysisError::MalformedRequest(format!("invalid base64 image: {e}")))
}

/// Decode an encoded image (any format the `image` crate recognizes) into a
/// 3-channel raster
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, AnalysisError> {
    let image = image::load_from_memory(bytes).map_err(|e| {
        tracing::debug!("image decoding failed: {e}");
        AnalysisError::ImageDecode
    })?;
    let image = image.to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(AnalysisError::ImageDecode);
    }
    Ok(image)
}

/// Crop a face out of `image`, convert it to grayscale, resize it to
/// `size` x `size` and scale the pixels into [0, 1]. The result is row-major.
pub fn preprocess_face(
    image: &RgbImage,
    face: &BoundingBox,
    padding: u32,
    size: u32,
) -> Option<Vec<f32>> {
    let (x, y, width, height) = face.padded_region(padding, image.width(), image.height())?;
    let crop = imageops::crop_imm(image, x, y, width, height).to_image();
    let gray = to_gray_601(&crop);
    let resized = imageops::resize(&gray, size, size, FilterType::Triangle);
    Some(resized.pixels().map(|p| p.0[0] as f32 / 255.0).collect())
}

/// Grayscale with BT.601 weights. `imageops::grayscale` uses BT.709.
pub fn to_gray_601(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = LUMA_601[0] * r as f32 + LUMA_601[1] * g as f32 + LUMA_601[2] * b as f32;
        Luma([luma.round().min(255.0) as u8])
    })
}

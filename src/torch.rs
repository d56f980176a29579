//! Facial emotion detection with TorchScript models

use crate::config::ModelSettings;
use crate::detector::{BoundingBox, DetectorError, EmotionDetector, FaceEmotions};
use crate::emotion::EmotionDistribution;
use crate::vision;
use image::RgbImage;
use std::path::Path;
use std::sync::Mutex;
use tch::{no_grad, CModule, Device, Kind, Tensor};
use tracing::{debug, info, warn};

/// Columns of a face detector output row: `x1, y1, x2, y2, score`
const BOX_COLUMNS: usize = 5;

/// Number of emotion classes the classifier must emit
const NUM_CLASSES: usize = 7;

/// Scores are reported with two decimals
const SCORE_SCALE: f32 = 100.0;

impl From<tch::TchError> for DetectorError {
    fn from(err: tch::TchError) -> Self {
        DetectorError::InferenceFailed(err.to_string())
    }
}

/// How face regions are found before classification
#[derive(Debug)]
enum FaceLocator {
    /// A TorchScript face detector
    Model(Mutex<CModule>),
    /// Treat the whole image as a single face
    WholeFrame,
}

impl FaceLocator {
    /// Faces at or above `threshold`, most confident first
    fn locate(
        &self,
        image: &RgbImage,
        device: Device,
        threshold: f32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let model = match self {
            FaceLocator::Model(model) => model,
            FaceLocator::WholeFrame => {
                return Ok(vec![BoundingBox::full_frame(image.width(), image.height())])
            }
        };

        let input = image_to_tensor(image).to_device(device);
        let output = {
            let model = model.lock().map_err(|_| DetectorError::Poisoned)?;
            no_grad(|| model.forward_ts(&[input]))?
        };

        let faces = parse_boxes(&output.to_device(Device::Cpu))?;
        Ok(select_faces(faces, threshold))
    }
}

/// Face detection and emotion classification backed by TorchScript modules.
///
/// `CModule` is not safe to run from several threads at once, so each module
/// sits behind its own lock and concurrent requests take turns.
#[derive(Debug)]
pub struct TorchDetector {
    classifier: Mutex<CModule>,
    faces: FaceLocator,
    device: Device,
    settings: ModelSettings,
}

impl TorchDetector {
    /// Load the configured models. A face detector is required unless
    /// `assume_single_face` is set.
    pub fn load(settings: &ModelSettings) -> Result<Self, DetectorError> {
        if settings.face_detector.is_none() && !settings.assume_single_face {
            return Err(DetectorError::Config(
                "model.face_detector is required unless model.assume_single_face is set".into(),
            ));
        }

        let device = match settings.cuda {
            true => Device::cuda_if_available(),
            false => Device::Cpu,
        };

        let classifier = load_module(&settings.classifier, device)?;
        let faces = match settings.face_detector.as_deref() {
            Some(path) => FaceLocator::Model(Mutex::new(load_module(path, device)?)),
            None => {
                warn!("no face detector configured, every image is classified as one face");
                FaceLocator::WholeFrame
            }
        };

        info!(
            classifier = %settings.classifier.display(),
            face_detector = ?settings.face_detector,
            ?device,
            "loaded emotion models"
        );

        Ok(TorchDetector {
            classifier: Mutex::new(classifier),
            faces,
            device,
            settings: settings.clone(),
        })
    }

    /// Score every face against the emotion vocabulary in a single batch
    fn classify(
        &self,
        image: &RgbImage,
        faces: Vec<BoundingBox>,
    ) -> Result<Vec<FaceEmotions>, DetectorError> {
        let size = self.settings.input_size as i64;
        let (regions, pixels) =
            crop_faces(image, faces, self.settings.face_padding, self.settings.input_size);
        if regions.is_empty() {
            return Ok(vec![]);
        }

        let batch = Tensor::from_slice(&pixels)
            .view([regions.len() as i64, 1, size, size])
            .to_device(self.device);
        let output = {
            let model = self.classifier.lock().map_err(|_| DetectorError::Poisoned)?;
            no_grad(|| model.forward_ts(&[batch]))?
        };
        let output = match self.settings.softmax {
            true => output.softmax(-1, Some(Kind::Float)),
            false => output.to_kind(Kind::Float),
        };

        let scores = parse_scores(&output.to_device(Device::Cpu), regions.len())?;
        Ok(regions
            .into_iter()
            .zip(scores)
            .map(|(region, emotions)| FaceEmotions { region, emotions })
            .collect())
    }
}

impl EmotionDetector for TorchDetector {
    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn detect_emotions(&self, image: &RgbImage) -> Result<Vec<FaceEmotions>, DetectorError> {
        let faces = self
            .faces
            .locate(image, self.device, self.settings.face_threshold)?;
        debug!("located {} faces", faces.len());
        self.classify(image, faces)
    }

    fn name(&self) -> &str {
        "torchscript"
    }
}

fn load_module(path: &Path, device: Device) -> Result<CModule, DetectorError> {
    if !path.exists() {
        return Err(DetectorError::ModelNotFound(path.display().to_string()));
    }
    CModule::load_on_device(path, device)
        .map_err(|e| DetectorError::Config(format!("cannot load {}: {e}", path.display())))
}

/// Drop faces below `threshold` (or with a non-finite score) and order the
/// rest by descending confidence. Equal scores keep the model's order.
fn select_faces(mut faces: Vec<BoundingBox>, threshold: f32) -> Vec<BoundingBox> {
    faces.retain(|face| face.confidence.is_finite() && face.confidence >= threshold);
    faces.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    faces
}

/// Preprocess every face into one row-major `size` x `size` plane. Faces whose
/// region lies outside the image are skipped, so the returned regions line up
/// with the planes.
fn crop_faces(
    image: &RgbImage,
    faces: Vec<BoundingBox>,
    padding: u32,
    size: u32,
) -> (Vec<BoundingBox>, Vec<f32>) {
    let plane = (size as usize) * (size as usize);
    let mut regions = Vec::with_capacity(faces.len());
    let mut pixels = Vec::with_capacity(faces.len() * plane);
    for face in faces {
        if let Some(crop) = vision::preprocess_face(image, &face, padding, size) {
            regions.push(face);
            pixels.extend(crop);
        }
    }
    (regions, pixels)
}

/// `[1, 3, H, W]` float tensor with channels scaled into [0, 1]
fn image_to_tensor(image: &RgbImage) -> Tensor {
    let (width, height) = image.dimensions();
    let img = Tensor::from_slice(image.as_raw())
        .view([height as i64, width as i64, 3])
        .permute([2, 0, 1]);
    let img = img.to_kind(Kind::Float) / 255.;
    img.unsqueeze(0)
}

/// Read `[N, 5]` (or `[1, N, 5]`) face detector output into boxes
fn parse_boxes(output: &Tensor) -> Result<Vec<BoundingBox>, DetectorError> {
    let size = output.size();
    if size.last().copied() != Some(BOX_COLUMNS as i64) {
        return Err(DetectorError::InferenceFailed(format!(
            "face detector returned shape {size:?}, expected [N, {BOX_COLUMNS}]"
        )));
    }

    let values = Vec::<f32>::try_from(&output.to_kind(Kind::Float).reshape([-1]))?;
    Ok(values
        .chunks_exact(BOX_COLUMNS)
        .map(|row| BoundingBox::from_corners(row[0], row[1], row[2], row[3], row[4]))
        .collect())
}

/// Read `[N, 7]` classifier output into one rounded distribution per face
fn parse_scores(output: &Tensor, faces: usize) -> Result<Vec<EmotionDistribution>, DetectorError> {
    let size = output.size();
    if size != [faces as i64, NUM_CLASSES as i64] {
        return Err(DetectorError::InferenceFailed(format!(
            "classifier returned shape {size:?}, expected [{faces}, {NUM_CLASSES}]"
        )));
    }

    let values = Vec::<f32>::try_from(&output.reshape([-1]))?;
    Ok(values
        .chunks_exact(NUM_CLASSES)
        .map(|row| {
            let mut scores = [0f32; NUM_CLASSES];
            for (dst, src) in scores.iter_mut().zip(row) {
                *dst = (src * SCORE_SCALE).round() / SCORE_SCALE;
            }
            EmotionDistribution::from(scores)
        })
        .collect())
}

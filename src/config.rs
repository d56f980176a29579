//! Server configuration. Values are layered: built-in defaults, then an
//! optional TOML file, then `EMOTION_API_*` environment variables
//! (`__` separates nested keys, e.g. `EMOTION_API_MODEL__CLASSIFIER`).

use config::{ConfigError, Environment, File, Source};
use serde::Deserialize;
use std::path::PathBuf;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "emotion-api";

const ENV_PREFIX: &str = "EMOTION_API";

/// Largest accepted classifier input side length
pub const MAX_INPUT_SIZE: u32 = 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Number of HTTP worker threads, one per core when unset
    pub workers: Option<usize>,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log: String,
    pub model: ModelSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// TorchScript emotion classifier, `[N, 1, S, S]` grayscale in, `[N, 7]` out
    pub classifier: PathBuf,
    /// TorchScript face detector, `[1, 3, H, W]` RGB in, `[N, 5]` boxes out
    pub face_detector: Option<PathBuf>,
    /// Classify the whole image as one face when no face detector is set.
    /// Images without a face then still get a non-zero prediction.
    pub assume_single_face: bool,
    /// Side length of the square classifier input
    pub input_size: u32,
    pub face_threshold: f32,
    /// Pixels added around each face before cropping
    pub face_padding: u32,
    /// Apply softmax to the classifier output (for models that emit logits)
    pub softmax: bool,
    pub cuda: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "0.0.0.0".into(),
            port: 8000,
            workers: None,
            max_body_bytes: 10 * 1024 * 1024,
            log: "info".into(),
            model: ModelSettings::default(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            classifier: PathBuf::from("models/emotion.pt"),
            face_detector: None,
            assume_single_face: false,
            input_size: 48,
            face_threshold: 0.5,
            face_padding: 10,
            softmax: true,
            cuda: false,
        }
    }
}

impl Settings {
    /// Load settings from `path` (must exist) or from the default config file
    /// (optional), with environment overrides on top
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::build(File::with_name(path).required(true)),
            None => Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        }
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?
            .validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let size = self.model.input_size;
        if size == 0 || size > MAX_INPUT_SIZE {
            return Err(ConfigError::Message(format!(
                "model.input_size must be between 1 and {MAX_INPUT_SIZE}, got {size}"
            )));
        }
        Ok(self)
    }
}

//! Interfaces to the external inference capabilities the core depends on.
//!
//! The detector, landmark predictor and encoder are opaque: this crate never
//! implements them. Implementations must be `Send + Sync`; any internal
//! mutable state (an inference session, a scratch buffer) is the
//! implementor's to synchronize.

use std::path::Path;

use image::{GrayImage, RgbImage};
use thiserror::Error;

use crate::types::{FaceBox, FeatureVector, LandmarkSet};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle failed: {0}")]
    Failed(String),
}

/// Detector model hint passed through to the face detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorModel {
    /// Fast histogram-of-gradients detector.
    #[default]
    Hog,
    /// Slower, more accurate CNN detector.
    Cnn,
}

impl DetectorModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorModel::Hog => "hog",
            DetectorModel::Cnn => "cnn",
        }
    }
}

impl std::str::FromStr for DetectorModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hog" => Ok(DetectorModel::Hog),
            "cnn" => Ok(DetectorModel::Cnn),
            other => Err(format!("unknown detector model '{other}'")),
        }
    }
}

pub trait FaceDetector: Send + Sync {
    /// Report every face rectangle found in the grayscale image, in detector order.
    fn detect(&self, gray: &GrayImage, model: DetectorModel) -> Result<Vec<FaceBox>, OracleError>;
}

pub trait LandmarkPredictor: Send + Sync {
    /// Predict the 68 ordered landmark points inside `face`.
    fn landmarks(&self, gray: &GrayImage, face: FaceBox) -> Result<LandmarkSet, OracleError>;
}

pub trait FaceEncoder: Send + Sync {
    /// Produce the identity signature of `face`, or `None` if the encoder
    /// could not compute one.
    fn encode(&self, rgb: &RgbImage, face: FaceBox) -> Result<Option<FeatureVector>, OracleError>;
}

/// Builds a landmark predictor from a model file on disk.
pub trait LandmarkLoader {
    fn load(&self, model_path: &Path) -> Result<Box<dyn LandmarkPredictor>, OracleError>;
}

/// Handle to the landmark model, constructed once at start-up.
///
/// Absence of the model is a first-class state rather than a missing global:
/// the strict quality gate consults it to decide whether to degrade.
pub enum LandmarkModel {
    Loaded(Box<dyn LandmarkPredictor>),
    Unavailable { reason: String },
}

impl LandmarkModel {
    pub fn loaded(predictor: impl LandmarkPredictor + 'static) -> Self {
        LandmarkModel::Loaded(Box::new(predictor))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        LandmarkModel::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LandmarkModel::Loaded(_))
    }

    /// Run the predictor, or report the model as unavailable.
    pub fn landmarks(&self, gray: &GrayImage, face: FaceBox) -> Result<LandmarkSet, OracleError> {
        match self {
            LandmarkModel::Loaded(predictor) => predictor.landmarks(gray, face),
            LandmarkModel::Unavailable { reason } => Err(OracleError::Unavailable(reason.clone())),
        }
    }
}

impl std::fmt::Debug for LandmarkModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LandmarkModel::Loaded(_) => f.write_str("LandmarkModel::Loaded"),
            LandmarkModel::Unavailable { reason } => f
                .debug_struct("LandmarkModel::Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

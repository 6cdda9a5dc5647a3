use image::GrayImage;
use thiserror::Error;

use crate::oracle::{DetectorModel, FaceDetector};
use crate::types::FaceBox;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("multiple faces detected ({0})")]
    MultipleFacesDetected(usize),
}

/// Run the detector and enforce the "exactly one face" policy.
///
/// A detector failure is treated the same as an empty result: the frame is
/// rejected and the caller may submit another.
pub fn locate_single_face(
    detector: &dyn FaceDetector,
    gray: &GrayImage,
    model: DetectorModel,
) -> Result<FaceBox, LocateError> {
    let boxes = detector.detect(gray, model).unwrap_or_else(|e| {
        tracing::warn!(error = %e, model = model.as_str(), "face detector failed");
        Vec::new()
    });

    match boxes.as_slice() {
        [] => Err(LocateError::NoFaceDetected),
        [face] => Ok(*face),
        many => Err(LocateError::MultipleFacesDetected(many.len())),
    }
}

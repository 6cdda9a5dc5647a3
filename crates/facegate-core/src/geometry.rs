//! Pose and liveness geometry from the 68-point landmark set.
//!
//! Pose is expressed as dimensionless ratios rather than angles:
//!
//! - **yaw** compares the horizontal distance from the nose tip to each outer
//!   eye corner. A frontal face sits near 1.0; turning shrinks one side.
//! - **pitch** compares the nose's vertical offset below the eye line with
//!   its offset above the upper lip.
//! - **proximity** is the jaw width as a fraction of the image width.
//!
//! Liveness is the eye aspect ratio (EAR): eye opening height over eye
//! width, averaged over both eyes. Open eyes measure roughly 0.25–0.4;
//! closed eyes fall below 0.2.
//!
//! # Threat Coverage
//!
//! - **Blocks:** photos of a subject with eyes closed, frames where the face
//!   is too small or off-axis for a reliable signature.
//! - **Does not block:** a photo of an open-eyed, frontal face. That is the
//!   job of the directional pose challenge.

use image::GrayImage;
use thiserror::Error;

use crate::oracle::{LandmarkModel, OracleError};
use crate::types::{FaceBox, LandmarkSet, Point};

/// Substituted for any zero (or negative) denominator.
pub const EPSILON: f64 = 0.001;

pub const NOSE_TIP: usize = 30;
/// Outer corner of the subject's right eye (image left, mirrored).
pub const LEFT_EYE_REF: usize = 36;
/// Outer corner of the subject's left eye (image right, mirrored).
pub const RIGHT_EYE_REF: usize = 45;
pub const MOUTH_TOP: usize = 51;
pub const JAW_LEFT: usize = 0;
pub const JAW_RIGHT: usize = 16;
pub const LEFT_EYE_CHAIN: std::ops::Range<usize> = 42..48;
pub const RIGHT_EYE_CHAIN: std::ops::Range<usize> = 36..42;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("landmark model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("landmark extraction failed: {0}")]
    Failed(String),
}

impl From<OracleError> for LandmarkError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::Unavailable(reason) => LandmarkError::ModelUnavailable(reason),
            OracleError::Failed(reason) => LandmarkError::Failed(reason),
        }
    }
}

/// Head pose ratios derived from one landmark set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMetrics {
    pub yaw_ratio: f64,
    pub pitch_ratio: f64,
    /// Always > 0.
    pub proximity: f64,
}

/// Everything the validators need from one face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceGeometry {
    pub metrics: PoseMetrics,
    /// Mean eye aspect ratio of both eyes.
    pub liveness: f64,
}

/// Compute pose ratios for a landmark set inside an image `image_width` pixels wide.
pub fn pose_metrics(landmarks: &LandmarkSet, image_width: u32) -> PoseMetrics {
    let nose = landmarks.point(NOSE_TIP);
    let left_eye = landmarks.point(LEFT_EYE_REF);
    let right_eye = landmarks.point(RIGHT_EYE_REF);
    let mouth = landmarks.point(MOUTH_TOP);

    let d_left = f64::from(nose.x - left_eye.x);
    let d_right = f64::from(right_eye.x - nose.x).max(EPSILON);
    let yaw_ratio = d_left / d_right;

    let eye_line_y = f64::from(left_eye.y + right_eye.y) / 2.0;
    let d_up = f64::from(nose.y) - eye_line_y;
    let d_down = f64::from(mouth.y - nose.y).max(EPSILON);
    let pitch_ratio = d_up / d_down;

    let face_width = landmarks
        .point(JAW_LEFT)
        .distance(&landmarks.point(JAW_RIGHT))
        .max(EPSILON);
    let proximity = face_width / f64::from(image_width.max(1));

    PoseMetrics {
        yaw_ratio,
        pitch_ratio,
        proximity,
    }
}

/// Eye aspect ratio over a 6-point eye chain `p1..p6`.
pub fn eye_aspect_ratio(eye: &[Point]) -> f64 {
    debug_assert_eq!(eye.len(), 6);
    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]).max(EPSILON);
    (a + b) / (2.0 * c)
}

/// Mean EAR across both eyes.
pub fn liveness_score(landmarks: &LandmarkSet) -> f64 {
    let points = landmarks.points();
    let left = eye_aspect_ratio(&points[LEFT_EYE_CHAIN]);
    let right = eye_aspect_ratio(&points[RIGHT_EYE_CHAIN]);
    (left + right) / 2.0
}

/// Obtain landmarks for `face` and reduce them to pose metrics and liveness.
pub fn analyze(
    model: &LandmarkModel,
    gray: &GrayImage,
    face: FaceBox,
) -> Result<FaceGeometry, LandmarkError> {
    let landmarks = model.landmarks(gray, face)?;
    let metrics = pose_metrics(&landmarks, gray.width());
    let liveness = liveness_score(&landmarks);

    tracing::debug!(
        yaw = metrics.yaw_ratio,
        pitch = metrics.pitch_ratio,
        proximity = metrics.proximity,
        liveness,
        "face geometry"
    );

    Ok(FaceGeometry { metrics, liveness })
}

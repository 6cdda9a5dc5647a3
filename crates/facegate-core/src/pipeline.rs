//! End-to-end biometric flows: enroll, login, pose challenge.
//!
//! Each flow is a fixed fail-fast sequence over one frame. Nothing is retried
//! and nothing persists between calls; storage and multi-step challenge
//! sequencing belong to the caller.

use thiserror::Error;

use crate::encoder::{self, EncodingError};
use crate::frame::{self, DecodeError, Frame};
use crate::geometry::{self, LandmarkError};
use crate::locator::{self, LocateError};
use crate::matcher::{EuclideanMatcher, Matcher, DEFAULT_TOLERANCE};
use crate::oracle::{DetectorModel, FaceDetector, FaceEncoder, LandmarkModel};
use crate::pose::{self, AcceptReason, Decision, RejectReason};
use crate::types::{EnrollmentRecord, FaceBox, FeatureVector};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("corrupt image: {0}")]
    Decode(#[from] DecodeError),
    #[error("face not detected")]
    NoFaceDetected,
    #[error("multiple faces detected ({0})")]
    MultipleFacesDetected(usize),
    #[error("{0}")]
    PoseRejected(RejectReason),
    #[error("biometric analysis error: {0}")]
    LandmarkExtraction(#[from] LandmarkError),
    #[error("could not generate face signature: {0}")]
    EncodingExtraction(#[from] EncodingError),
    #[error("access denied")]
    NoMatch,
}

impl From<LocateError> for PipelineError {
    fn from(e: LocateError) -> Self {
        match e {
            LocateError::NoFaceDetected => PipelineError::NoFaceDetected,
            LocateError::MultipleFacesDetected(n) => PipelineError::MultipleFacesDetected(n),
        }
    }
}

impl PipelineError {
    /// Most specific stable code: the reject reason for pose rejections,
    /// otherwise the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode_error",
            PipelineError::NoFaceDetected => "no_face_detected",
            PipelineError::MultipleFacesDetected(_) => "multiple_faces_detected",
            PipelineError::PoseRejected(reason) => reason.code(),
            PipelineError::LandmarkExtraction(_) => "landmark_extraction_error",
            PipelineError::EncodingExtraction(_) => "encoding_extraction_error",
            PipelineError::NoMatch => "no_match",
        }
    }
}

/// Which flow produced a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessCode {
    Enrolled,
    AccessGranted,
    PoseMatched,
}

impl SuccessCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuccessCode::Enrolled => "enrolled",
            SuccessCode::AccessGranted => "access_granted",
            SuccessCode::PoseMatched => "pose_matched",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SuccessCode::Enrolled => "biometric enrollment successful",
            SuccessCode::AccessGranted => "access granted",
            SuccessCode::PoseMatched => "pose detected",
        }
    }
}

/// Tagged result of one pipeline invocation.
#[derive(Debug)]
pub enum Outcome<T> {
    Success { code: SuccessCode, payload: T },
    Failure(PipelineError),
}

pub type EnrollOutcome = Outcome<FeatureVector>;
pub type LoginOutcome = Outcome<LoginMatch>;
pub type ChallengeOutcome = Outcome<()>;

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            Outcome::Success { code, .. } => code.as_str(),
            Outcome::Failure(e) => e.code(),
        }
    }

    /// Human-readable message for the end user.
    pub fn message(&self) -> String {
        match self {
            Outcome::Success { code, .. } => code.message().to_string(),
            Outcome::Failure(e) => e.to_string(),
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Outcome::Success { payload, .. } => Some(payload),
            Outcome::Failure(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            Outcome::Success { payload, .. } => Some(payload),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure(e) => Some(e),
        }
    }

    fn from_result(result: Result<T, PipelineError>, code: SuccessCode) -> Self {
        match result {
            Ok(payload) => Outcome::Success { code, payload },
            Err(e) => Outcome::Failure(e),
        }
    }
}

/// Identity selected by a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginMatch {
    pub user_id: String,
    pub distance: f64,
}

/// What the strict quality gate does when the landmark model is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivenessPolicy {
    /// Skip the gate ("development mode"); enrollment and login proceed
    /// without liveness enforcement.
    #[default]
    Permissive,
    /// Fail enrollment and login with a landmark extraction error.
    Enforced,
}

impl LivenessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessPolicy::Permissive => "permissive",
            LivenessPolicy::Enforced => "enforced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub tolerance: f64,
    pub detector_model: DetectorModel,
    pub liveness_policy: LivenessPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            detector_model: DetectorModel::Hog,
            liveness_policy: LivenessPolicy::Permissive,
        }
    }
}

/// The three biometric flows over a fixed set of oracles.
///
/// All methods take `&self`; one pipeline may serve concurrent callers.
pub struct BiometricPipeline {
    detector: Box<dyn FaceDetector>,
    landmarks: LandmarkModel,
    encoder: Box<dyn FaceEncoder>,
    config: PipelineConfig,
}

impl BiometricPipeline {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        landmarks: LandmarkModel,
        encoder: Box<dyn FaceEncoder>,
        config: PipelineConfig,
    ) -> Self {
        if let LandmarkModel::Unavailable { reason } = &landmarks {
            tracing::warn!(
                reason = %reason,
                policy = config.liveness_policy.as_str(),
                "landmark model unavailable; liveness quality gate will not run"
            );
        }
        Self {
            detector,
            landmarks,
            encoder,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn landmark_model(&self) -> &LandmarkModel {
        &self.landmarks
    }

    /// Decode → locate → quality gate → extract. The caller persists the vector.
    pub fn enroll(&self, payload: &str) -> EnrollOutcome {
        let outcome = Outcome::from_result(self.run_enroll(payload), SuccessCode::Enrolled);
        tracing::info!(success = outcome.is_success(), code = outcome.code(), "enroll pipeline");
        outcome
    }

    /// Decode → locate → quality gate → extract → first-match scan of `gallery`.
    pub fn login(&self, payload: &str, gallery: &[EnrollmentRecord]) -> LoginOutcome {
        let outcome = Outcome::from_result(self.run_login(payload, gallery), SuccessCode::AccessGranted);
        tracing::info!(
            success = outcome.is_success(),
            code = outcome.code(),
            gallery = gallery.len(),
            "login pipeline"
        );
        outcome
    }

    /// Decode → locate → geometry → directional check against `target`.
    pub fn pose_challenge(&self, payload: &str, target: &str) -> ChallengeOutcome {
        let outcome = Outcome::from_result(self.run_challenge(payload, target), SuccessCode::PoseMatched);
        tracing::debug!(target, success = outcome.is_success(), code = outcome.code(), "pose challenge");
        outcome
    }

    fn locate(&self, payload: &str) -> Result<(Frame, FaceBox), PipelineError> {
        let frame = frame::decode_frame(payload)?;
        let face = locator::locate_single_face(
            self.detector.as_ref(),
            &frame.gray,
            self.config.detector_model,
        )?;
        Ok((frame, face))
    }

    fn quality_gate(&self, frame: &Frame, face: FaceBox) -> Result<AcceptReason, PipelineError> {
        if let LandmarkModel::Unavailable { reason } = &self.landmarks {
            return match self.config.liveness_policy {
                LivenessPolicy::Permissive => {
                    tracing::warn!(reason = %reason, "quality gate skipped (development mode)");
                    Ok(AcceptReason::DevelopmentMode)
                }
                LivenessPolicy::Enforced => Err(LandmarkError::ModelUnavailable(reason.clone()).into()),
            };
        }

        let geometry = geometry::analyze(&self.landmarks, &frame.gray, face)?;
        match pose::analyze_face_structure(&geometry.metrics, geometry.liveness) {
            Decision::Accept(reason) => Ok(reason),
            Decision::Reject(reason) => Err(PipelineError::PoseRejected(reason)),
        }
    }

    fn signature(&self, payload: &str) -> Result<FeatureVector, PipelineError> {
        let (frame, face) = self.locate(payload)?;
        self.quality_gate(&frame, face)?;
        Ok(encoder::extract_encoding(self.encoder.as_ref(), &frame, face)?)
    }

    fn run_enroll(&self, payload: &str) -> Result<FeatureVector, PipelineError> {
        self.signature(payload)
    }

    fn run_login(&self, payload: &str, gallery: &[EnrollmentRecord]) -> Result<LoginMatch, PipelineError> {
        let probe = self.signature(payload)?;
        let result = EuclideanMatcher.find(&probe, gallery, self.config.tolerance);
        match (result.matched, result.user_id, result.distance) {
            (true, Some(user_id), Some(distance)) => Ok(LoginMatch { user_id, distance }),
            (_, _, closest) => {
                tracing::debug!(closest = ?closest, tolerance = self.config.tolerance, "no enrolled match");
                Err(PipelineError::NoMatch)
            }
        }
    }

    fn run_challenge(&self, payload: &str, target: &str) -> Result<(), PipelineError> {
        let (frame, face) = self.locate(payload)?;
        let geometry = geometry::analyze(&self.landmarks, &frame.gray, face)?;
        match pose::validate_pose_label(&geometry.metrics, target) {
            Decision::Accept(_) => Ok(()),
            Decision::Reject(reason) => Err(PipelineError::PoseRejected(reason)),
        }
    }
}

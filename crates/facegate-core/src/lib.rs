//! facegate-core: the biometric decision core.
//!
//! Turns one captured frame into an accept/reject decision: decode, locate
//! exactly one face, measure pose and eye openness from landmarks, gate on
//! quality or a directional challenge, extract an identity signature and
//! match it against enrolled signatures. Face detection, landmark
//! prediction and encoding are external oracles (see [`oracle`]).

pub mod encoder;
pub mod frame;
pub mod geometry;
pub mod locator;
pub mod matcher;
pub mod oracle;
pub mod pipeline;
pub mod pose;
pub mod types;

#[cfg(test)]
mod testutil;

pub use frame::{decode_frame, decode_frame_bytes, DecodeError, Frame};
pub use geometry::{FaceGeometry, PoseMetrics};
pub use matcher::{compare, find_matching_user, EuclideanMatcher, MatchOutcome, Matcher, DEFAULT_TOLERANCE};
pub use oracle::{
    DetectorModel, FaceDetector, FaceEncoder, LandmarkLoader, LandmarkModel, LandmarkPredictor, OracleError,
};
pub use pipeline::{
    BiometricPipeline, ChallengeOutcome, EnrollOutcome, LivenessPolicy, LoginMatch, LoginOutcome, Outcome,
    PipelineConfig, PipelineError, SuccessCode,
};
pub use pose::{Decision, PoseTarget, RejectReason};
pub use types::{EnrollmentRecord, FaceBox, FeatureVector, LandmarkSet, Point, FEATURE_DIM};

//! Accept/reject predicates over face geometry.
//!
//! Two independent families:
//!
//! - [`validate_pose`]: directional challenge-response: is the subject doing
//!   what they were asked (look center/left/right/up/down)?
//! - [`analyze_face_structure`]: the fixed "centered and alive" quality gate
//!   applied before an identity signature is extracted.
//!
//! Both are pure functions of [`PoseMetrics`] and the liveness score.

use std::fmt;
use std::str::FromStr;

use crate::geometry::PoseMetrics;

/// Minimum proximity for any pose challenge.
pub const CHALLENGE_MIN_PROXIMITY: f64 = 0.22;
pub const CENTER_YAW_MIN: f64 = 0.7;
pub const CENTER_YAW_MAX: f64 = 1.4;
pub const CENTER_PITCH_MIN: f64 = 0.55;
pub const CENTER_PITCH_MAX: f64 = 1.5;
pub const LEFT_YAW_MAX: f64 = 0.6;
pub const RIGHT_YAW_MIN: f64 = 1.5;
pub const UP_PITCH_MAX: f64 = 0.5;
pub const DOWN_PITCH_MIN: f64 = 1.7;

/// Minimum mean EAR for the quality gate.
pub const QUALITY_MIN_LIVENESS: f64 = 0.18;
pub const QUALITY_MIN_PROXIMITY: f64 = 0.28;
pub const QUALITY_YAW_MIN: f64 = 0.7;
pub const QUALITY_YAW_MAX: f64 = 1.4;
pub const QUALITY_PITCH_MIN: f64 = 0.5;
pub const QUALITY_PITCH_MAX: f64 = 1.8;

/// Directional pose requested from the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseTarget {
    Center,
    Left,
    Right,
    Up,
    Down,
}

impl PoseTarget {
    pub const ALL: [PoseTarget; 5] = [
        PoseTarget::Center,
        PoseTarget::Left,
        PoseTarget::Right,
        PoseTarget::Up,
        PoseTarget::Down,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoseTarget::Center => "CENTER",
            PoseTarget::Left => "LEFT",
            PoseTarget::Right => "RIGHT",
            PoseTarget::Up => "UP",
            PoseTarget::Down => "DOWN",
        }
    }
}

impl fmt::Display for PoseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoseTarget {
    type Err = RejectReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoseTarget::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(RejectReason::UnknownPose)
    }
}

/// Why a frame failed a pose or quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MoveCloser,
    /// CENTER requested, subject looking toward their right.
    LookCenterFromRight,
    /// CENTER requested, subject looking toward their left.
    LookCenterFromLeft,
    LowerHead,
    RaiseHead,
    TurnLeft,
    TurnRight,
    LookUp,
    LookDown,
    UnknownPose,
    EyesClosed,
    TooFar,
    TurnToCenter,
    AdjustHeadTilt,
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MoveCloser => "move_closer",
            RejectReason::LookCenterFromRight => "look_center_right",
            RejectReason::LookCenterFromLeft => "look_center_left",
            RejectReason::LowerHead => "lower_head",
            RejectReason::RaiseHead => "raise_head",
            RejectReason::TurnLeft => "turn_left",
            RejectReason::TurnRight => "turn_right",
            RejectReason::LookUp => "look_up",
            RejectReason::LookDown => "look_down",
            RejectReason::UnknownPose => "unknown_pose",
            RejectReason::EyesClosed => "eyes_closed",
            RejectReason::TooFar => "too_far",
            RejectReason::TurnToCenter => "turn_to_center",
            RejectReason::AdjustHeadTilt => "adjust_head_tilt",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::MoveCloser => "move closer",
            RejectReason::LookCenterFromRight => "look at the center (you are looking right)",
            RejectReason::LookCenterFromLeft => "look at the center (you are looking left)",
            RejectReason::LowerHead => "lower your head",
            RejectReason::RaiseHead => "raise your head",
            RejectReason::TurnLeft => "turn to your left",
            RejectReason::TurnRight => "turn to your right",
            RejectReason::LookUp => "look up",
            RejectReason::LookDown => "look down",
            RejectReason::UnknownPose => "unknown pose",
            RejectReason::EyesClosed => "eyes closed, open them wide",
            RejectReason::TooFar => "too far, move closer to the camera",
            RejectReason::TurnToCenter => "turn to center",
            RejectReason::AdjustHeadTilt => "adjust head tilt",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Why a frame passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptReason {
    PoseMatched,
    QualityAccepted,
    /// Landmark model missing: the quality gate was skipped.
    DevelopmentMode,
}

impl AcceptReason {
    pub fn code(&self) -> &'static str {
        match self {
            AcceptReason::PoseMatched => "pose_matched",
            AcceptReason::QualityAccepted => "quality_accepted",
            AcceptReason::DevelopmentMode => "development_mode",
        }
    }
}

/// Result of a pose or quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept(AcceptReason),
    Reject(RejectReason),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accept(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Decision::Accept(r) => r.code(),
            Decision::Reject(r) => r.code(),
        }
    }

    fn check(ok: bool, otherwise: RejectReason) -> Self {
        if ok {
            Decision::Accept(AcceptReason::PoseMatched)
        } else {
            Decision::Reject(otherwise)
        }
    }
}

/// Check that the subject is performing `target`.
pub fn validate_pose(metrics: &PoseMetrics, target: PoseTarget) -> Decision {
    let yaw = metrics.yaw_ratio;
    let pitch = metrics.pitch_ratio;

    if metrics.proximity < CHALLENGE_MIN_PROXIMITY {
        return Decision::Reject(RejectReason::MoveCloser);
    }

    match target {
        PoseTarget::Center => {
            if yaw < CENTER_YAW_MIN {
                Decision::Reject(RejectReason::LookCenterFromRight)
            } else if yaw > CENTER_YAW_MAX {
                Decision::Reject(RejectReason::LookCenterFromLeft)
            } else if pitch < CENTER_PITCH_MIN {
                Decision::Reject(RejectReason::LowerHead)
            } else if pitch > CENTER_PITCH_MAX {
                Decision::Reject(RejectReason::RaiseHead)
            } else {
                Decision::Accept(AcceptReason::PoseMatched)
            }
        }
        PoseTarget::Left => Decision::check(yaw < LEFT_YAW_MAX, RejectReason::TurnLeft),
        PoseTarget::Right => Decision::check(yaw > RIGHT_YAW_MIN, RejectReason::TurnRight),
        PoseTarget::Up => Decision::check(pitch < UP_PITCH_MAX, RejectReason::LookUp),
        PoseTarget::Down => Decision::check(pitch > DOWN_PITCH_MIN, RejectReason::LookDown),
    }
}

/// [`validate_pose`] for a caller-supplied label; unknown labels are rejected.
pub fn validate_pose_label(metrics: &PoseMetrics, label: &str) -> Decision {
    match label.parse::<PoseTarget>() {
        Ok(target) => validate_pose(metrics, target),
        Err(reason) => Decision::Reject(reason),
    }
}

/// Strict "centered and alive" gate applied before extracting an encoding.
pub fn analyze_face_structure(metrics: &PoseMetrics, liveness: f64) -> Decision {
    if liveness < QUALITY_MIN_LIVENESS {
        return Decision::Reject(RejectReason::EyesClosed);
    }
    if metrics.proximity < QUALITY_MIN_PROXIMITY {
        return Decision::Reject(RejectReason::TooFar);
    }
    if !(QUALITY_YAW_MIN..=QUALITY_YAW_MAX).contains(&metrics.yaw_ratio) {
        return Decision::Reject(RejectReason::TurnToCenter);
    }
    if !(QUALITY_PITCH_MIN..=QUALITY_PITCH_MAX).contains(&metrics.pitch_ratio) {
        return Decision::Reject(RejectReason::AdjustHeadTilt);
    }
    Decision::Accept(AcceptReason::QualityAccepted)
}

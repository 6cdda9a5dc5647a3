//! Caller-side tracking of a multi-step pose challenge.
//!
//! The pipeline validates one frame against one target and keeps no state.
//! A client working through a sequence (look center, then left, then right,
//! ...) holds a [`ChallengeSequence`] in its own session, validates each frame
//! against [`ChallengeSequence::current`] and records the outcome together
//! with the target it was checked against. An outcome for any other target
//! never advances the sequence; [`crate::FaceAuthService::advance_challenge`]
//! does both steps.

use facegate_core::{ChallengeOutcome, PoseTarget};

/// Default sequence: center, left, right, up, back to center.
pub const DEFAULT_SEQUENCE: [PoseTarget; 5] = [
    PoseTarget::Center,
    PoseTarget::Left,
    PoseTarget::Right,
    PoseTarget::Up,
    PoseTarget::Center,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSequence {
    steps: Vec<PoseTarget>,
    next: usize,
}

impl Default for ChallengeSequence {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE.to_vec())
    }
}

impl ChallengeSequence {
    pub fn new(steps: Vec<PoseTarget>) -> Self {
        Self { steps, next: 0 }
    }

    /// Target the next frame must satisfy, or `None` once complete.
    pub fn current(&self) -> Option<PoseTarget> {
        self.steps.get(self.next).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.steps.len()
    }

    pub fn completed_steps(&self) -> usize {
        self.next
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Advance past the current step if `outcome` is a pass for exactly the
    /// current target. Returns whether it did.
    pub fn record(&mut self, target: PoseTarget, outcome: &ChallengeOutcome) -> bool {
        if self.current() != Some(target) || !outcome.is_success() {
            return false;
        }
        self.next += 1;
        true
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

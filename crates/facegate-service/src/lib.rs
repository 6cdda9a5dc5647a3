//! Facegate authentication service.
//!
//! Wires the biometric pipelines in `facegate-core` to persistence and
//! operational concerns: the encrypted enrollment store, a dedicated engine
//! thread with per-call deadlines, login rate limiting and environment
//! configuration. [`FaceAuthService`] is the entry point for transports.

pub mod challenge;
pub mod config;
pub mod engine;
pub mod rate_limiter;
pub mod service;
pub mod store;

pub use challenge::ChallengeSequence;
pub use config::Config;
pub use engine::{EngineError, EngineHandle, LandmarkStatus, Oracles};
pub use service::{FaceAuthService, ServiceError};
pub use store::{EnrollmentInfo, EnrollmentStore, StoreError};

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use facegate_core::{ChallengeOutcome, EnrollOutcome, LoginOutcome, Outcome, PipelineError};

use crate::challenge::ChallengeSequence;
use crate::config::Config;
use crate::engine::{self, EngineError, EngineHandle, Oracles};
use crate::rate_limiter::{AttemptResult, LoginRateLimiter};
use crate::store::{EnrollmentStore, StoreError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("too many failed attempts; try again in {0}s")]
    RateLimited(u64),
    #[error("invalid user id")]
    InvalidUser,
    #[error("challenge sequence already complete")]
    ChallengeComplete,
}

/// Face authentication façade: runs pipelines on the engine thread and owns
/// persistence and login throttling around them.
#[derive(Clone)]
pub struct FaceAuthService {
    config: Arc<Config>,
    engine: EngineHandle,
    store: EnrollmentStore,
    rate_limiter: Arc<Mutex<LoginRateLimiter>>,
}

impl FaceAuthService {
    /// Open the store and start the engine.
    pub async fn start(config: Config, oracles: Oracles) -> Result<Self, ServiceError> {
        let store = EnrollmentStore::open(&config.db_path).await?;
        let engine = engine::spawn_engine(&config, oracles)?;
        tracing::info!(
            db = %config.db_path.display(),
            tolerance = config.match_tolerance,
            liveness_policy = config.liveness_policy.as_str(),
            "face auth service ready"
        );
        Ok(Self::with_parts(config, engine, store))
    }

    pub fn with_parts(config: Config, engine: EngineHandle, store: EnrollmentStore) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            store,
            rate_limiter: Arc::new(Mutex::new(LoginRateLimiter::new())),
        }
    }

    pub fn store(&self) -> &EnrollmentStore {
        &self.store
    }

    /// Enroll (or re-enroll) `user_id` from one frame; the vector is stored
    /// only when the pipeline succeeds.
    pub async fn enroll(&self, user_id: &str, payload: &str) -> Result<EnrollOutcome, ServiceError> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::InvalidUser);
        }
        tracing::info!(user_id, "enroll requested");

        let outcome = self.engine.enroll(payload.to_string()).await?;
        if let Outcome::Success { payload: encoding, .. } = &outcome {
            self.store.save(user_id, encoding).await.map_err(|e| {
                tracing::error!(user_id, error = %e, "enroll: store save failed");
                e
            })?;
            tracing::info!(user_id, "enrolled successfully");
        } else {
            tracing::info!(user_id, code = outcome.code(), "enroll rejected");
        }
        Ok(outcome)
    }

    /// Identify the subject of one frame among all enrollments.
    ///
    /// `client` keys the rate limiter. The attempt is reserved before the
    /// pipeline runs; only a completed non-match counts against the client.
    pub async fn login(&self, client: &str, payload: &str) -> Result<LoginOutcome, ServiceError> {
        self.rate_limiter.lock().await.begin_attempt(client).map_err(|remaining| {
            tracing::warn!(client, remaining, "login: rate limited");
            ServiceError::RateLimited(remaining)
        })?;

        let result = self.run_login(payload).await;

        let settled = match &result {
            Ok(Outcome::Success { .. }) => AttemptResult::Granted,
            Ok(Outcome::Failure(PipelineError::NoMatch)) => AttemptResult::Denied,
            Ok(Outcome::Failure(_)) | Err(_) => AttemptResult::Inconclusive,
        };
        self.rate_limiter.lock().await.finish_attempt(client, settled);

        match &result {
            Ok(Outcome::Success { payload: matched, .. }) => tracing::info!(
                client,
                user_id = %matched.user_id,
                distance = matched.distance,
                "login granted"
            ),
            Ok(Outcome::Failure(e)) => tracing::info!(client, code = e.code(), "login denied"),
            Err(e) => tracing::error!(client, error = %e, "login failed"),
        }
        result
    }

    async fn run_login(&self, payload: &str) -> Result<LoginOutcome, ServiceError> {
        let gallery = self.store.all_enrolled().await?;
        if gallery.is_empty() {
            tracing::warn!("login: no enrollments");
        }
        Ok(self.engine.login(payload.to_string(), gallery).await?)
    }

    /// Validate one frame of a directional challenge.
    pub async fn pose_challenge(&self, payload: &str, target: &str) -> Result<ChallengeOutcome, ServiceError> {
        Ok(self
            .engine
            .pose_challenge(payload.to_string(), target.to_string())
            .await?)
    }

    /// Validate one frame against the step `sequence` is waiting for and
    /// advance it on a pass.
    pub async fn advance_challenge(
        &self,
        sequence: &mut ChallengeSequence,
        payload: &str,
    ) -> Result<ChallengeOutcome, ServiceError> {
        let target = sequence.current().ok_or(ServiceError::ChallengeComplete)?;
        let outcome = self.pose_challenge(payload, target.as_str()).await?;
        if sequence.record(target, &outcome) {
            tracing::debug!(
                pose = target.as_str(),
                completed = sequence.completed_steps(),
                total = sequence.total_steps(),
                "challenge step passed"
            );
        }
        Ok(outcome)
    }

    /// Remove a user's enrollment. Returns whether one existed.
    pub async fn revoke(&self, user_id: &str) -> Result<bool, ServiceError> {
        let removed = self.store.clear(user_id).await?;
        if removed {
            tracing::info!(user_id, "enrollment revoked");
        } else {
            tracing::warn!(user_id, "revoke: no enrollment");
        }
        Ok(removed)
    }

    /// Health and configuration summary as JSON.
    pub async fn status(&self) -> Result<String, ServiceError> {
        let enrolled = self.store.count_all().await?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "enrolled": enrolled,
            "landmark_model": self.engine.landmark_status(),
            "match_tolerance": self.config.match_tolerance,
            "detector_model": self.config.detector_model.as_str(),
            "liveness_policy": self.config.liveness_policy.as_str(),
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use facegate_core::types::{FEATURE_DIM, LANDMARK_COUNT};
    use facegate_core::{
        DetectorModel, FaceBox, FaceDetector, FaceEncoder, FeatureVector, LandmarkLoader, LandmarkPredictor,
        LandmarkSet, LivenessPolicy, OracleError, Point,
    };
    use image::{GrayImage, ImageFormat, Rgb, RgbImage};

    /// Encoder whose output the test can change between calls.
    #[derive(Clone)]
    struct SwitchableEncoder(Arc<StdMutex<f32>>);

    impl FaceEncoder for SwitchableEncoder {
        fn encode(&self, _: &RgbImage, _: FaceBox) -> Result<Option<FeatureVector>, OracleError> {
            let first = *self.0.lock().unwrap();
            let mut values = vec![0.0f32; FEATURE_DIM];
            values[0] = first;
            Ok(FeatureVector::new(values).ok())
        }
    }

    struct OneFace;

    impl FaceDetector for OneFace {
        fn detect(&self, _: &GrayImage, _: DetectorModel) -> Result<Vec<FaceBox>, OracleError> {
            Ok(vec![FaceBox::new(150, 450, 350, 190)])
        }
    }

    struct FrontalFace;

    impl LandmarkPredictor for FrontalFace {
        fn landmarks(&self, _: &GrayImage, _: FaceBox) -> Result<LandmarkSet, OracleError> {
            let mut p = [Point::default(); LANDMARK_COUNT];
            p[0] = Point::new(200, 250);
            p[16] = Point::new(440, 250);
            let right_eye = [(250, 200), (265, 192), (280, 192), (295, 200), (280, 208), (265, 208)];
            let left_eye = [(345, 200), (360, 192), (375, 192), (390, 200), (375, 208), (360, 208)];
            for (i, (x, y)) in right_eye.into_iter().enumerate() {
                p[36 + i] = Point::new(x, y);
            }
            for (i, (x, y)) in left_eye.into_iter().enumerate() {
                p[42 + i] = Point::new(x, y);
            }
            p[30] = Point::new(320, 240);
            p[51] = Point::new(320, 280);
            Ok(LandmarkSet::new(p))
        }
    }

    struct FrontalLoader;

    impl LandmarkLoader for FrontalLoader {
        fn load(&self, _: &Path) -> Result<Box<dyn LandmarkPredictor>, OracleError> {
            Ok(Box::new(FrontalFace))
        }
    }

    fn payload() -> String {
        let img = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "facegate-service-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    struct SlowDetector(Duration);

    impl FaceDetector for SlowDetector {
        fn detect(&self, _: &GrayImage, _: DetectorModel) -> Result<Vec<FaceBox>, OracleError> {
            std::thread::sleep(self.0);
            Ok(vec![FaceBox::new(150, 450, 350, 190)])
        }
    }

    async fn service_with(config: Config, detector: Box<dyn FaceDetector>) -> (FaceAuthService, Arc<StdMutex<f32>>) {
        let next_vector = Arc::new(StdMutex::new(0.1f32));
        let oracles = Oracles {
            detector,
            encoder: Box::new(SwitchableEncoder(next_vector.clone())),
            landmark_loader: Box::new(FrontalLoader),
        };
        let store = EnrollmentStore::open(&config.db_path).await.unwrap();
        let engine = engine::spawn_engine(&config, oracles).unwrap();
        (FaceAuthService::with_parts(config, engine, store), next_vector)
    }

    fn config_for(model_dir: PathBuf, policy: LivenessPolicy) -> Config {
        Config {
            db_path: PathBuf::from(":memory:"),
            model_dir,
            liveness_policy: policy,
            ..Config::default()
        }
    }

    async fn service(model_dir: PathBuf, policy: LivenessPolicy) -> (FaceAuthService, Arc<StdMutex<f32>>) {
        service_with(config_for(model_dir, policy), Box::new(OneFace)).await
    }

    fn installed_model_dir(tag: &str) -> PathBuf {
        let dir = scratch_dir(tag);
        std::fs::write(dir.join(facegate_models::LANDMARK_MODEL.name), b"weights").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_enroll_then_login() {
        let dir = installed_model_dir("enroll-login");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;

        let enrolled = svc.enroll("alice", &payload()).await.unwrap();
        assert!(enrolled.is_success());
        assert!(svc.store().load("alice").await.unwrap().is_some());

        let login = svc.login("10.0.0.1", &payload()).await.unwrap();
        assert_eq!(login.payload().unwrap().user_id, "alice");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_rejected_enroll_is_not_persisted() {
        let dir = installed_model_dir("rejected");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;

        let outcome = svc.enroll("alice", "not-an-image").await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(svc.store().count_all().await.unwrap(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let dir = installed_model_dir("empty-user");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;
        assert!(matches!(
            svc.enroll("  ", &payload()).await,
            Err(ServiceError::InvalidUser)
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_repeated_non_matches_lock_client() {
        let dir = installed_model_dir("lockout");
        let (svc, next_vector) = service(dir.clone(), LivenessPolicy::Permissive).await;
        svc.enroll("alice", &payload()).await.unwrap();

        *next_vector.lock().unwrap() = 0.9;
        for _ in 0..crate::rate_limiter::MAX_FAILURES {
            let outcome = svc.login("10.0.0.9", &payload()).await.unwrap();
            assert_eq!(outcome.code(), "no_match");
        }
        assert!(matches!(
            svc.login("10.0.0.9", &payload()).await,
            Err(ServiceError::RateLimited(_))
        ));
        // Other clients are unaffected
        assert!(svc.login("10.0.0.10", &payload()).await.is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_undecodable_frames_do_not_count_against_client() {
        let dir = installed_model_dir("bad-frames");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;
        for _ in 0..crate::rate_limiter::MAX_FAILURES + 1 {
            let outcome = svc.login("10.0.0.9", "garbage").await.unwrap();
            assert_eq!(outcome.code(), "decode_error");
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_reenrollment_replaces_vector() {
        let dir = installed_model_dir("reenroll");
        let (svc, next_vector) = service(dir.clone(), LivenessPolicy::Permissive).await;
        svc.enroll("alice", &payload()).await.unwrap();

        *next_vector.lock().unwrap() = 2.0;
        svc.enroll("alice", &payload()).await.unwrap();

        let stored = svc.store().load("alice").await.unwrap().unwrap();
        assert_eq!(stored.as_slice()[0], 2.0);
        assert_eq!(svc.store().count_all().await.unwrap(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_revoke_removes_enrollment() {
        let dir = installed_model_dir("revoke");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;
        svc.enroll("alice", &payload()).await.unwrap();

        assert!(svc.revoke("alice").await.unwrap());
        assert!(!svc.revoke("alice").await.unwrap());
        assert_eq!(svc.login("10.0.0.1", &payload()).await.unwrap().code(), "no_match");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_pose_challenge_runs_on_engine() {
        let dir = installed_model_dir("challenge");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;

        assert!(svc.pose_challenge(&payload(), "CENTER").await.unwrap().is_success());
        assert_eq!(
            svc.pose_challenge(&payload(), "LEFT").await.unwrap().code(),
            "turn_left"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_model_degrades_and_shows_in_status() {
        let dir = scratch_dir("no-model");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;

        assert!(svc.enroll("alice", &payload()).await.unwrap().is_success());

        let status: serde_json::Value = serde_json::from_str(&svc.status().await.unwrap()).unwrap();
        assert_eq!(status["enrolled"], 1);
        assert_eq!(status["landmark_model"]["loaded"], false);
        assert_eq!(status["liveness_policy"], "permissive");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_model_enforced_blocks_enroll() {
        let dir = scratch_dir("no-model-enforced");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Enforced).await;

        let outcome = svc.enroll("alice", &payload()).await.unwrap();
        assert_eq!(outcome.code(), "landmark_extraction_error");
        assert_eq!(svc.store().count_all().await.unwrap(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_status_reports_loaded_model() {
        let dir = installed_model_dir("status");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;

        let status: serde_json::Value = serde_json::from_str(&svc.status().await.unwrap()).unwrap();
        assert_eq!(status["landmark_model"]["loaded"], true);
        assert_eq!(status["match_tolerance"], 0.45);
        assert_eq!(status["detector_model"], "hog");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_respect_attempt_budget() {
        let dir = installed_model_dir("concurrent");
        let (svc, next_vector) = service(dir.clone(), LivenessPolicy::Permissive).await;
        svc.enroll("alice", &payload()).await.unwrap();
        *next_vector.lock().unwrap() = 0.9;

        let frame = payload();
        let attempts: Vec<_> = (0..20)
            .map(|_| {
                let svc = svc.clone();
                let frame = frame.clone();
                tokio::spawn(async move { svc.login("10.0.0.9", &frame).await })
            })
            .collect();

        let (mut ran, mut limited) = (0, 0);
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(outcome) => {
                    assert_eq!(outcome.code(), "no_match");
                    ran += 1;
                }
                Err(ServiceError::RateLimited(_)) => limited += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ran, crate::rate_limiter::MAX_FAILURES);
        assert_eq!(limited, 20 - crate::rate_limiter::MAX_FAILURES);
        assert!(matches!(
            svc.login("10.0.0.9", &frame).await,
            Err(ServiceError::RateLimited(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_slow_pipeline_hits_deadline() {
        let dir = installed_model_dir("deadline");
        let config = Config {
            pipeline_timeout_secs: 1,
            ..config_for(dir.clone(), LivenessPolicy::Permissive)
        };
        let (svc, _) = service_with(config, Box::new(SlowDetector(Duration::from_secs(3)))).await;

        match svc.enroll("alice", &payload()).await {
            Err(ServiceError::Engine(EngineError::Timeout(limit))) => {
                assert_eq!(limit, Duration::from_secs(1));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(svc.store().count_all().await.unwrap(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_advance_challenge_follows_sequence() {
        let dir = installed_model_dir("sequence");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;
        let mut sequence = ChallengeSequence::default();

        // The frontal face passes CENTER, then is held at LEFT
        assert!(svc.advance_challenge(&mut sequence, &payload()).await.unwrap().is_success());
        assert_eq!(sequence.completed_steps(), 1);

        for _ in 0..3 {
            let outcome = svc.advance_challenge(&mut sequence, &payload()).await.unwrap();
            assert_eq!(outcome.code(), "turn_left");
        }
        assert_eq!(sequence.current(), Some(facegate_core::PoseTarget::Left));
        assert_eq!(sequence.completed_steps(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_advance_challenge_on_complete_sequence() {
        let dir = installed_model_dir("sequence-done");
        let (svc, _) = service(dir.clone(), LivenessPolicy::Permissive).await;
        let mut sequence = ChallengeSequence::new(vec![facegate_core::PoseTarget::Center]);

        assert!(svc.advance_challenge(&mut sequence, &payload()).await.unwrap().is_success());
        assert!(sequence.is_complete());
        assert!(matches!(
            svc.advance_challenge(&mut sequence, &payload()).await,
            Err(ServiceError::ChallengeComplete)
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

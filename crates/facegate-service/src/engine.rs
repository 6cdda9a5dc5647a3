use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use facegate_core::{
    BiometricPipeline, ChallengeOutcome, EnrollOutcome, EnrollmentRecord, FaceDetector, FaceEncoder,
    LandmarkLoader, LandmarkModel, LoginOutcome,
};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("pipeline call exceeded {0:?}")]
    Timeout(Duration),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// The external inference capabilities the engine is built from.
pub struct Oracles {
    pub detector: Box<dyn FaceDetector>,
    pub encoder: Box<dyn FaceEncoder>,
    pub landmark_loader: Box<dyn LandmarkLoader>,
}

/// Landmark model state as reported by health checks.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LandmarkStatus {
    pub loaded: bool,
    pub reason: Option<String>,
}

/// Messages sent from service handlers to the engine thread.
enum EngineRequest {
    Enroll {
        payload: String,
        reply: oneshot::Sender<EnrollOutcome>,
    },
    Login {
        payload: String,
        gallery: Vec<EnrollmentRecord>,
        reply: oneshot::Sender<LoginOutcome>,
    },
    Challenge {
        payload: String,
        target: String,
        reply: oneshot::Sender<ChallengeOutcome>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    timeout: Duration,
    landmark_status: LandmarkStatus,
}

impl EngineHandle {
    pub fn landmark_status(&self) -> &LandmarkStatus {
        &self.landmark_status
    }

    /// Run the enroll pipeline on one frame.
    pub async fn enroll(&self, payload: String) -> Result<EnrollOutcome, EngineError> {
        self.request(|reply| EngineRequest::Enroll { payload, reply }).await
    }

    /// Run the login pipeline on one frame against `gallery`.
    pub async fn login(
        &self,
        payload: String,
        gallery: Vec<EnrollmentRecord>,
    ) -> Result<LoginOutcome, EngineError> {
        self.request(|reply| EngineRequest::Login {
            payload,
            gallery,
            reply,
        })
        .await
    }

    /// Run the pose challenge pipeline on one frame.
    pub async fn pose_challenge(
        &self,
        payload: String,
        target: String,
    ) -> Result<ChallengeOutcome, EngineError> {
        self.request(|reply| EngineRequest::Challenge {
            payload,
            target,
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let call = async {
            self.tx
                .send(build(reply_tx))
                .await
                .map_err(|_| EngineError::ChannelClosed)?;
            reply_rx.await.map_err(|_| EngineError::ChannelClosed)
        };
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))?
    }
}

/// Build the landmark model handle: verify the model file, then load it.
///
/// A missing or corrupt model is logged and yields
/// [`LandmarkModel::Unavailable`]; it never aborts start-up.
pub fn load_landmark_model(config: &Config, loader: &dyn LandmarkLoader) -> LandmarkModel {
    let path = match facegate_models::check_landmark_model(
        &config.model_dir,
        config.landmark_model_sha256.as_deref(),
    ) {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(error = %e, "landmark model check failed");
            return LandmarkModel::unavailable(e.to_string());
        }
    };

    match loader.load(&path) {
        Ok(predictor) => {
            tracing::info!(path = %path.display(), "landmark model loaded");
            LandmarkModel::Loaded(predictor)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "landmark model failed to load");
            LandmarkModel::unavailable(e.to_string())
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Resolves the landmark model, assembles the pipeline, then enters a
/// request loop. Pipelines are CPU-bound and never run on the async runtime.
pub fn spawn_engine(config: &Config, oracles: Oracles) -> Result<EngineHandle, EngineError> {
    let landmarks = load_landmark_model(config, oracles.landmark_loader.as_ref());
    let landmark_status = match &landmarks {
        LandmarkModel::Loaded(_) => LandmarkStatus {
            loaded: true,
            reason: None,
        },
        LandmarkModel::Unavailable { reason } => LandmarkStatus {
            loaded: false,
            reason: Some(reason.clone()),
        },
    };

    let pipeline = BiometricPipeline::new(
        oracles.detector,
        landmarks,
        oracles.encoder,
        config.pipeline_config(),
    );

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll { payload, reply } => {
                        let _ = reply.send(pipeline.enroll(&payload));
                    }
                    EngineRequest::Login {
                        payload,
                        gallery,
                        reply,
                    } => {
                        let _ = reply.send(pipeline.login(&payload, &gallery));
                    }
                    EngineRequest::Challenge {
                        payload,
                        target,
                        reply,
                    } => {
                        let _ = reply.send(pipeline.pose_challenge(&payload, &target));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle {
        tx,
        timeout: Duration::from_secs(config.pipeline_timeout_secs),
        landmark_status,
    })
}

use std::path::PathBuf;

use facegate_core::{DetectorModel, LivenessPolicy, PipelineConfig, DEFAULT_TOLERANCE};

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing the landmark model file.
    pub model_dir: PathBuf,
    /// Pinned SHA-256 of the landmark model; presence-only check when unset.
    pub landmark_model_sha256: Option<String>,
    /// Maximum Euclidean distance for a login match.
    pub match_tolerance: f64,
    /// Detector model hint passed to the face detector.
    pub detector_model: DetectorModel,
    /// What the quality gate does when the landmark model is missing.
    pub liveness_policy: LivenessPolicy,
    /// Deadline in seconds for a single pipeline call.
    pub pipeline_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = facegate_models::default_data_dir();

        let db_path = std::env::var("FACEGATE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("faces.db"));

        let model_dir = std::env::var("FACEGATE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let detector_model = std::env::var("FACEGATE_DETECTOR_MODEL")
            .ok()
            .and_then(|v| match v.parse() {
                Ok(model) => Some(model),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring FACEGATE_DETECTOR_MODEL");
                    None
                }
            })
            .unwrap_or_default();

        let liveness_policy = match std::env::var("FACEGATE_REQUIRE_LIVENESS_MODEL") {
            Ok(v) if v != "0" => LivenessPolicy::Enforced,
            _ => LivenessPolicy::Permissive,
        };

        Self {
            db_path,
            model_dir,
            landmark_model_sha256: std::env::var("FACEGATE_LANDMARK_MODEL_SHA256")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            match_tolerance: env_f64("FACEGATE_MATCH_TOLERANCE", DEFAULT_TOLERANCE),
            detector_model,
            liveness_policy,
            pipeline_timeout_secs: env_u64("FACEGATE_PIPELINE_TIMEOUT_SECS", 10),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            tolerance: self.match_tolerance,
            detector_model: self.detector_model,
            liveness_policy: self.liveness_policy,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = facegate_models::default_data_dir();
        Self {
            db_path: data_dir.join("faces.db"),
            model_dir: data_dir.join("models"),
            landmark_model_sha256: None,
            match_tolerance: DEFAULT_TOLERANCE,
            detector_model: DetectorModel::Hog,
            liveness_policy: LivenessPolicy::Permissive,
            pipeline_timeout_secs: 10,
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    parse_f64(key, std::env::var(key).ok().as_deref(), default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    parse_positive_u64(key, std::env::var(key).ok().as_deref(), default)
}

fn parse_f64(key: &str, raw: Option<&str>, default: f64) -> f64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        _ => {
            tracing::warn!(key, value = raw, default, "ignoring invalid setting");
            default
        }
    }
}

/// Zero is rejected: a zero deadline would fail every pipeline call.
fn parse_positive_u64(key: &str, raw: Option<&str>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => v,
        _ => {
            tracing::warn!(key, value = raw, default, "ignoring invalid setting");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_single_tolerance_constant() {
        let config = Config::default();
        assert_eq!(config.match_tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.pipeline_config().tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.liveness_policy, LivenessPolicy::Permissive);
    }

    #[test]
    fn test_pipeline_config_carries_settings() {
        let config = Config {
            match_tolerance: 0.5,
            detector_model: DetectorModel::Cnn,
            liveness_policy: LivenessPolicy::Enforced,
            ..Config::default()
        };
        let pc = config.pipeline_config();
        assert_eq!(pc.tolerance, 0.5);
        assert_eq!(pc.detector_model, DetectorModel::Cnn);
        assert_eq!(pc.liveness_policy, LivenessPolicy::Enforced);
    }

    #[test]
    fn test_zero_timeout_falls_back_to_default() {
        let key = "FACEGATE_PIPELINE_TIMEOUT_SECS";
        assert_eq!(parse_positive_u64(key, Some("0"), 10), 10);
        assert_eq!(parse_positive_u64(key, Some("soon"), 10), 10);
        assert_eq!(parse_positive_u64(key, Some(" 3 "), 10), 3);
        assert_eq!(parse_positive_u64(key, None, 10), 10);
    }

    #[test]
    fn test_invalid_tolerance_falls_back_to_default() {
        let key = "FACEGATE_MATCH_TOLERANCE";
        assert_eq!(parse_f64(key, Some("-0.1"), DEFAULT_TOLERANCE), DEFAULT_TOLERANCE);
        assert_eq!(parse_f64(key, Some("NaN"), DEFAULT_TOLERANCE), DEFAULT_TOLERANCE);
        assert_eq!(parse_f64(key, Some("0.6"), DEFAULT_TOLERANCE), 0.6);
    }
}

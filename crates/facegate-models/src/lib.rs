use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Model file descriptor: expected filename, upstream URL, human-readable size.
pub struct ModelFile {
    pub name: &'static str,
    pub url: &'static str,
    pub size_display: &'static str,
}

/// The 68-point shape predictor consumed by the landmark oracle.
///
/// Upstream ships it bz2-compressed; the installed file is the decompressed
/// `.dat`. No checksum is pinned here: deployments pin their own copy via
/// `FACEGATE_LANDMARK_MODEL_SHA256`.
pub const LANDMARK_MODEL: ModelFile = ModelFile {
    name: "shape_predictor_68_face_landmarks.dat",
    url: "http://dlib.net/files/shape_predictor_68_face_landmarks.dat.bz2",
    size_display: "95 MB",
};

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("landmark model not found at {0}")]
    Missing(PathBuf),

    #[error("landmark model at {0} is empty")]
    Empty(PathBuf),

    #[error("cannot read landmark model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("landmark model {path} does not match the pinned checksum (expected {expected}, got {got})")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// An installed landmark model as reported by [`inspect_landmark_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    /// Whether `sha256` was compared against a pinned value.
    pub pinned: bool,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ModelIntegrityError + '_ {
    move |source| ModelIntegrityError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Size of a present, non-empty model file.
fn non_empty_len(path: &Path) -> Result<u64, ModelIntegrityError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ModelIntegrityError::Missing(path.to_path_buf()))
        }
        Err(e) => return Err(io_error(path)(e)),
    };
    if meta.len() == 0 {
        return Err(ModelIntegrityError::Empty(path.to_path_buf()));
    }
    Ok(meta.len())
}

fn sha256_hex(path: &Path) -> Result<String, ModelIntegrityError> {
    let mut file = fs::File::open(path).map_err(io_error(path))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(io_error(path))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn compare_pinned(path: &Path, got: String, expected: &str) -> Result<String, ModelIntegrityError> {
    if got.eq_ignore_ascii_case(expected.trim()) {
        Ok(got)
    } else {
        Err(ModelIntegrityError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_string(),
            got,
        })
    }
}

/// Check a landmark model file at an arbitrary path (an installed copy or a
/// freshly staged download).
///
/// The file must be non-empty; with `expected_sha256` it must also match it.
/// Unpinned files are not hashed.
pub fn verify_model_file(path: &Path, expected_sha256: Option<&str>) -> Result<(), ModelIntegrityError> {
    non_empty_len(path)?;
    if let Some(expected) = expected_sha256 {
        compare_pinned(path, sha256_hex(path)?, expected)?;
    }
    Ok(())
}

/// Locate the landmark model under `model_dir` and check it is usable.
/// Returns the model path on success.
pub fn check_landmark_model(
    model_dir: &Path,
    expected_sha256: Option<&str>,
) -> Result<PathBuf, ModelIntegrityError> {
    let path = model_dir.join(LANDMARK_MODEL.name);
    verify_model_file(&path, expected_sha256)?;
    Ok(path)
}

/// Like [`check_landmark_model`] but always hashes the file, for operator
/// reports.
pub fn inspect_landmark_model(
    model_dir: &Path,
    expected_sha256: Option<&str>,
) -> Result<ModelReport, ModelIntegrityError> {
    let path = model_dir.join(LANDMARK_MODEL.name);
    let bytes = non_empty_len(&path)?;
    let digest = sha256_hex(&path)?;
    let sha256 = match expected_sha256 {
        Some(expected) => compare_pinned(&path, digest, expected)?,
        None => digest,
    };
    Ok(ModelReport {
        path,
        bytes,
        sha256,
        pinned: expected_sha256.is_some(),
    })
}

/// Default data directory.
///
/// When running as root (UID 0), `/var/lib/facegate` (system-wide).
/// Otherwise `$XDG_DATA_HOME/facegate` (~/.local/share/facegate).
pub fn default_data_dir() -> PathBuf {
    if is_root() {
        PathBuf::from("/var/lib/facegate")
    } else {
        let data_home = std::env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{home}/.local/share")
        });
        PathBuf::from(data_home).join("facegate")
    }
}

pub fn default_model_dir() -> PathBuf {
    default_data_dir().join("models")
}

fn is_root() -> bool {
    // SAFETY: geteuid is always safe to call.
    unsafe { libc::geteuid() == 0 }
}

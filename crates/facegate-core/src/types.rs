use thiserror::Error;

/// Number of elements in a face feature vector.
pub const FEATURE_DIM: usize = 128;
/// Size of a serialized feature vector: 128 little-endian `f32` values.
pub const FEATURE_BYTE_LEN: usize = FEATURE_DIM * 4;
/// Number of points in a landmark set (standard 68-point face model).
pub const LANDMARK_COUNT: usize = 68;

/// Face rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Integer landmark coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// The 68 ordered landmark points of a single face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkSet {
    points: [Point; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [Point; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Build from an arbitrary slice; `None` unless exactly 68 points are given.
    pub fn from_slice(points: &[Point]) -> Option<Self> {
        let points: [Point; LANDMARK_COUNT] = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    pub fn points(&self) -> &[Point; LANDMARK_COUNT] {
        &self.points
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum FeatureVectorError {
    #[error("invalid feature vector dimension: {0} (expected 128)")]
    InvalidDim(usize),
    #[error("invalid feature vector value (NaN/Inf)")]
    InvalidValue,
    #[error("invalid feature vector byte length: {0} (expected 512)")]
    InvalidByteLen(usize),
}

/// Identity signature produced by the encoder oracle.
///
/// Always exactly [`FEATURE_DIM`] finite values. The persisted form is
/// 128 little-endian IEEE-754 `f32`s with no header.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Result<Self, FeatureVectorError> {
        if values.len() != FEATURE_DIM {
            return Err(FeatureVectorError::InvalidDim(values.len()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FeatureVectorError::InvalidValue);
        }
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FEATURE_BYTE_LEN);
        for &v in &self.values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, FeatureVectorError> {
        if bytes.len() != FEATURE_BYTE_LEN {
            return Err(FeatureVectorError::InvalidByteLen(bytes.len()));
        }
        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(values)
    }
}

/// A stored identity signature, as handed to the Matching Engine.
#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    pub user_id: String,
    pub encoding: FeatureVector,
    pub created_at: String,
    pub updated_at: String,
}

use thiserror::Error;

use crate::frame::Frame;
use crate::oracle::{FaceEncoder, OracleError};
use crate::types::{FaceBox, FeatureVector};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("encoder produced no feature vector")]
    NoEncoding,
    #[error("encoder error: {0}")]
    Oracle(#[from] OracleError),
}

/// Produce the identity signature for an already-validated face.
pub fn extract_encoding(
    encoder: &dyn FaceEncoder,
    frame: &Frame,
    face: FaceBox,
) -> Result<FeatureVector, EncodingError> {
    let encoding = encoder
        .encode(&frame.color, face)?
        .ok_or(EncodingError::NoEncoding)?;
    tracing::debug!(?face, "feature vector extracted");
    Ok(encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::vector_with;
    use image::{GrayImage, RgbImage};

    struct FixedEncoder(Result<Option<FeatureVector>, OracleError>);

    impl FaceEncoder for FixedEncoder {
        fn encode(&self, _: &RgbImage, _: FaceBox) -> Result<Option<FeatureVector>, OracleError> {
            self.0.clone()
        }
    }

    fn frame() -> Frame {
        Frame {
            color: RgbImage::new(8, 8),
            gray: GrayImage::new(8, 8),
        }
    }

    #[test]
    fn test_returns_oracle_vector() {
        let encoder = FixedEncoder(Ok(Some(vector_with(0.25))));
        let v = extract_encoding(&encoder, &frame(), FaceBox::new(0, 8, 8, 0)).unwrap();
        assert_eq!(v.as_slice()[0], 0.25);
    }

    #[test]
    fn test_missing_vector_is_an_error() {
        let encoder = FixedEncoder(Ok(None));
        assert_eq!(
            extract_encoding(&encoder, &frame(), FaceBox::new(0, 8, 8, 0)),
            Err(EncodingError::NoEncoding)
        );
    }

    #[test]
    fn test_oracle_failure_is_an_error() {
        let encoder = FixedEncoder(Err(OracleError::Failed("dnn crashed".into())));
        assert!(matches!(
            extract_encoding(&encoder, &frame(), FaceBox::new(0, 8, 8, 0)),
            Err(EncodingError::Oracle(_))
        ));
    }
}

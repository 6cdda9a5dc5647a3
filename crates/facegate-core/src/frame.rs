//! Frame decoding: base64 (optionally data-URI prefixed) payload → color and
//! grayscale images.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{GrayImage, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty image payload")]
    Empty,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not a decodable image: {0}")]
    Image(#[from] image::ImageError),
    #[error("image has zero size ({width}x{height})")]
    ZeroSize { width: u32, height: u32 },
}

/// A decoded still frame: the RGB color image plus its grayscale derivative.
///
/// The color buffer is tightly packed RGB8 (row-major, contiguous), which is
/// the layout handed to the encoder oracle.
#[derive(Debug, Clone)]
pub struct Frame {
    pub color: RgbImage,
    pub gray: GrayImage,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.color.width()
    }

    pub fn height(&self) -> u32 {
        self.color.height()
    }
}

/// Strip an optional `data:image/...;base64,` marker.
fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, encoded)) => encoded,
        None => payload,
    }
}

/// Decode a client image payload into a [`Frame`].
///
/// Line breaks and other ASCII whitespace inside the base64 body are ignored
/// (MIME-wrapped payloads decode the same as single-line ones).
pub fn decode_frame(payload: &str) -> Result<Frame, DecodeError> {
    let encoded: String = strip_data_uri(payload.trim())
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if encoded.is_empty() {
        return Err(DecodeError::Empty);
    }
    let bytes = STANDARD.decode(&encoded)?;
    decode_frame_bytes(&bytes)
}

/// Decode raw encoded image bytes (JPEG, PNG, ...) into a [`Frame`].
pub fn decode_frame_bytes(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let img = image::load_from_memory(bytes)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(DecodeError::ZeroSize { width, height });
    }

    let color = img.to_rgb8();
    let gray = image::imageops::grayscale(&color);
    tracing::debug!(width, height, "frame decoded");

    Ok(Frame { color, gray })
}

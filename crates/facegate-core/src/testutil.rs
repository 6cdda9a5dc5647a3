//! Synthetic faces and frames shared by the unit tests.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};

use crate::types::{FeatureVector, LandmarkSet, Point, FEATURE_DIM, LANDMARK_COUNT};

/// A frontal, open-eyed face in a 640px-wide image.
///
/// yaw = 1.0, pitch = 1.0, proximity = 240 / 640, EAR = 32 / 90 per eye.
pub fn frontal_landmarks() -> LandmarkSet {
    let mut points = [Point::default(); LANDMARK_COUNT];

    points[0] = Point::new(200, 250);
    points[16] = Point::new(440, 250);

    // Subject's right eye (image left)
    points[36] = Point::new(250, 200);
    points[37] = Point::new(265, 192);
    points[38] = Point::new(280, 192);
    points[39] = Point::new(295, 200);
    points[40] = Point::new(280, 208);
    points[41] = Point::new(265, 208);

    // Subject's left eye (image right)
    points[42] = Point::new(345, 200);
    points[43] = Point::new(360, 192);
    points[44] = Point::new(375, 192);
    points[45] = Point::new(390, 200);
    points[46] = Point::new(375, 208);
    points[47] = Point::new(360, 208);

    points[30] = Point::new(320, 240);
    points[51] = Point::new(320, 280);

    LandmarkSet::new(points)
}

pub fn with_point(landmarks: LandmarkSet, index: usize, point: Point) -> LandmarkSet {
    let mut points = *landmarks.points();
    points[index] = point;
    LandmarkSet::new(points)
}

/// Squeeze both eyelids to 2px from the eye line (EAR ≈ 0.09).
pub fn with_closed_eyes(landmarks: LandmarkSet) -> LandmarkSet {
    let mut points = *landmarks.points();
    for upper in [37, 38, 43, 44] {
        points[upper].y = 198;
    }
    for lower in [40, 41, 46, 47] {
        points[lower].y = 202;
    }
    LandmarkSet::new(points)
}

pub fn vector_with(first: f32) -> FeatureVector {
    let mut values = vec![0.0f32; FEATURE_DIM];
    values[0] = first;
    FeatureVector::new(values).expect("valid test vector")
}

/// A solid-color PNG frame as a data-URI payload.
pub fn png_payload(width: u32, height: u32) -> String {
    let img = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png encode");
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

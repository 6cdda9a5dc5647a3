//! Tolerance-based identity matching over enrolled feature vectors.

use crate::types::{EnrollmentRecord, FeatureVector};

/// Default maximum Euclidean distance for two vectors to be the same identity.
pub const DEFAULT_TOLERANCE: f64 = 0.45;

/// Result of scanning a gallery for a probe vector.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub matched: bool,
    pub user_id: Option<String>,
    /// Distance to the matched record, or the closest distance seen when
    /// nothing matched. `None` for an empty gallery.
    pub distance: Option<f64>,
}

/// Euclidean distance between two feature vectors.
pub fn face_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// True iff the two vectors are within `tolerance` (inclusive).
pub fn compare(known: &FeatureVector, unknown: &FeatureVector, tolerance: f64) -> bool {
    face_distance(known, unknown) <= tolerance
}

/// Return the first record, in iteration order, within `tolerance` of `unknown`.
///
/// This is first-match, not nearest-match: a later, closer record never
/// displaces an earlier one that is already within tolerance.
pub fn find_matching_user<'a, I>(unknown: &FeatureVector, tolerance: f64, candidates: I) -> MatchOutcome
where
    I: IntoIterator<Item = &'a EnrollmentRecord>,
{
    let mut closest: Option<f64> = None;

    for record in candidates {
        let distance = face_distance(&record.encoding, unknown);
        if distance <= tolerance {
            return MatchOutcome {
                matched: true,
                user_id: Some(record.user_id.clone()),
                distance: Some(distance),
            };
        }
        closest = Some(closest.map_or(distance, |c| c.min(distance)));
    }

    MatchOutcome {
        matched: false,
        user_id: None,
        distance: closest,
    }
}

/// Gallery search strategy.
pub trait Matcher {
    fn find(&self, probe: &FeatureVector, gallery: &[EnrollmentRecord], tolerance: f64) -> MatchOutcome;
}

/// First-match linear scan under Euclidean distance.
#[derive(Debug, Default, Clone, Copy)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn find(&self, probe: &FeatureVector, gallery: &[EnrollmentRecord], tolerance: f64) -> MatchOutcome {
        find_matching_user(probe, tolerance, gallery)
    }
}

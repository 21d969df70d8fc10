//! Nearest-neighbour identity matching against the enrolled gallery.

use crate::types::{Embedding, KnownFace};
use serde::{Deserialize, Serialize};

/// Default Euclidean threshold for L2-normalized ArcFace embeddings.
///
/// On unit vectors `d = sqrt(2 - 2 cos)`, so 1.1 accepts cosine similarity
/// of about 0.40 and above.
pub const DEFAULT_EUCLIDEAN_THRESHOLD: f32 = 1.1;

/// Default cosine-distance threshold: similarity 0.40 and above.
pub const DEFAULT_COSINE_THRESHOLD: f32 = 0.6;

/// Tolerance of the dlib 128-d face model, in its own Euclidean units.
/// Only meaningful for embeddings on that scale.
pub const DLIB_EUCLIDEAN_TOLERANCE: f32 = 0.6;

/// Result of matching a query embedding against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Label of the closest known face, set only when `matched`.
    pub label: Option<String>,
    /// Distance to the closest known face, `None` for an empty gallery.
    pub distance: Option<f32>,
}

impl MatchResult {
    pub fn no_match(distance: Option<f32>) -> Self {
        Self {
            matched: false,
            label: None,
            distance,
        }
    }
}

/// Strategy for comparing a query embedding against the enrolled gallery.
///
/// Implementations must be pure: the same inputs always give the same result.
pub trait Matcher {
    /// Distance between two embeddings. Smaller is closer.
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32;

    /// Return the closest known face if its distance is within `threshold`.
    ///
    /// Ties resolve to the first candidate in `known` iteration order.
    /// Candidates whose embedding length differs from the query are never
    /// selected.
    fn best_match(&self, query: &Embedding, known: &[KnownFace], threshold: f32) -> MatchResult {
        let mut best: Option<(usize, f32)> = None;

        for (i, face) in known.iter().enumerate() {
            if face.embedding.len() != query.len() {
                tracing::debug!(
                    label = %face.label,
                    expected = query.len(),
                    actual = face.embedding.len(),
                    "skipping known face with mismatched embedding length"
                );
                continue;
            }
            let d = self.distance(query, &face.embedding);
            if d.is_nan() {
                continue;
            }
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((i, d)),
            }
        }

        match best {
            Some((idx, d)) if d <= threshold => MatchResult {
                matched: true,
                label: Some(known[idx].label.clone()),
                distance: Some(d),
            },
            Some((_, d)) => MatchResult::no_match(Some(d)),
            None => MatchResult::no_match(None),
        }
    }
}

/// Euclidean (L2) distance matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        a.euclidean_distance(b)
    }
}

/// Cosine distance matcher: `1 - cosine_similarity`, in [0, 2].
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn distance(&self, a: &Embedding, b: &Embedding) -> f32 {
        1.0 - a.similarity(b)
    }
}

/// Embedding-space metric selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Cosine,
}

impl DistanceMetric {
    /// Acceptance threshold for ArcFace embeddings under this metric.
    pub fn default_threshold(self) -> f32 {
        match self {
            DistanceMetric::Euclidean => DEFAULT_EUCLIDEAN_THRESHOLD,
            DistanceMetric::Cosine => DEFAULT_COSINE_THRESHOLD,
        }
    }

    pub fn matcher(self) -> Box<dyn Matcher + Send + Sync> {
        match self {
            DistanceMetric::Euclidean => Box::new(EuclideanMatcher),
            DistanceMetric::Cosine => Box::new(CosineMatcher),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "cosine" => Ok(DistanceMetric::Cosine),
            other => Err(format!("unknown distance metric: {other} (expected euclidean or cosine)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn face(label: &str, values: Vec<f32>) -> KnownFace {
        KnownFace {
            label: label.into(),
            embedding: Embedding::new(values),
            source: PathBuf::from(format!("{label}.jpg")),
        }
    }

    #[test]
    fn test_empty_gallery_is_no_match() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let result = EuclideanMatcher.best_match(&query, &[], DLIB_EUCLIDEAN_TOLERANCE);
        assert!(!result.matched);
        assert_eq!(result.label, None);
        assert_eq!(result.distance, None);
    }

    #[test]
    fn test_nothing_within_threshold() {
        let query = Embedding::new(vec![0.0, 0.0]);
        let gallery = vec![face("far", vec![1.0, 1.0]), face("farther", vec![2.0, 2.0])];
        let result = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        assert!(!result.matched);
        assert_eq!(result.label, None);
        assert!((result.distance.unwrap() - 2f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_single_candidate_within_threshold() {
        let query = Embedding::new(vec![0.0, 0.0]);
        let gallery = vec![face("far", vec![3.0, 0.0]), face("near", vec![0.3, 0.0])];
        let result = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        assert!(result.matched);
        assert_eq!(result.label.as_deref(), Some("near"));
    }

    #[test]
    fn test_minimum_distance_wins_among_several() {
        let query = Embedding::new(vec![0.0, 0.0]);
        let gallery = vec![
            face("a", vec![0.5, 0.0]),
            face("b", vec![0.1, 0.0]),
            face("c", vec![0.0, 0.3]),
        ];
        let result = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        assert_eq!(result.label.as_deref(), Some("b"));
        assert!((result.distance.unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let query = Embedding::new(vec![0.0]);
        let gallery = vec![face("edge", vec![0.5])];
        assert!(EuclideanMatcher.best_match(&query, &gallery, 0.5).matched);
        assert!(!EuclideanMatcher.best_match(&query, &gallery, 0.49).matched);
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let query = Embedding::new(vec![0.0, 0.0]);
        let gallery = vec![face("first", vec![0.2, 0.0]), face("second", vec![0.0, 0.2])];
        let result = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        assert_eq!(result.label.as_deref(), Some("first"));
    }

    #[test]
    fn test_no_runner_up_margin_check() {
        // Two nearly equidistant candidates still produce a match.
        let query = Embedding::new(vec![0.0]);
        let gallery = vec![face("a", vec![0.30]), face("b", vec![0.31])];
        let result = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        assert!(result.matched);
        assert_eq!(result.label.as_deref(), Some("a"));
    }

    #[test]
    fn test_mismatched_length_never_matches() {
        let query = Embedding::new(vec![0.0, 0.0]);
        let gallery = vec![face("short", vec![0.0])];
        let result = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        assert!(!result.matched);
        assert_eq!(result.distance, None);
    }

    #[test]
    fn test_matcher_is_pure() {
        let query = Embedding::new(vec![0.1, 0.2, 0.3]);
        let gallery = vec![face("x", vec![0.1, 0.2, 0.35]), face("y", vec![0.9, 0.9, 0.9])];
        let first = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        let second = EuclideanMatcher.best_match(&query, &gallery, DLIB_EUCLIDEAN_TOLERANCE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cosine_matcher_ignores_magnitude() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![face("scaled", vec![5.0, 0.0]), face("orthogonal", vec![0.0, 1.0])];
        let result = CosineMatcher.best_match(&query, &gallery, 0.1);
        assert_eq!(result.label.as_deref(), Some("scaled"));
        assert!(result.distance.unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("Euclidean".parse::<DistanceMetric>(), Ok(DistanceMetric::Euclidean));
        assert_eq!("cosine".parse::<DistanceMetric>(), Ok(DistanceMetric::Cosine));
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    /// Unit vector at the given cosine similarity to `[1, 0]`.
    fn at_cosine(cos: f32) -> Vec<f32> {
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    #[test]
    fn test_arcface_pair_matches_at_default_euclidean_threshold() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![face("Bob", at_cosine(0.5))];
        let t = DistanceMetric::Euclidean.default_threshold();

        let result = EuclideanMatcher.best_match(&query, &gallery, t);
        assert!(result.matched, "distance {:?} rejected at {t}", result.distance);
        assert_eq!(result.label.as_deref(), Some("Bob"));
        assert!((result.distance.unwrap() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_arcface_pair_matches_at_default_cosine_threshold() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![face("Bob", at_cosine(0.5))];
        let result = CosineMatcher.best_match(&query, &gallery, DistanceMetric::Cosine.default_threshold());
        assert!(result.matched);
    }

    #[test]
    fn test_dissimilar_arcface_pair_rejected_at_defaults() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let gallery = vec![face("Eve", at_cosine(0.2))];
        for metric in [DistanceMetric::Euclidean, DistanceMetric::Cosine] {
            let result = metric
                .matcher()
                .best_match(&query, &gallery, metric.default_threshold());
            assert!(!result.matched, "{metric:?} accepted cosine 0.2");
        }
    }

    #[test]
    fn test_default_thresholds_agree_on_unit_vectors() {
        // Both defaults sit at the same cosine similarity.
        let cos_from_euclidean = 1.0 - DEFAULT_EUCLIDEAN_THRESHOLD.powi(2) / 2.0;
        let cos_from_cosine = 1.0 - DEFAULT_COSINE_THRESHOLD;
        assert!((cos_from_euclidean - cos_from_cosine).abs() < 0.01);
    }
}

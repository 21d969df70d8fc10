use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Box without landmarks, for detectors that only report geometry.
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            landmarks: None,
        }
    }

    /// Pixel location as `(top, right, bottom, left)`.
    pub fn location(&self) -> FaceLocation {
        FaceLocation {
            top: self.y.round() as i32,
            right: (self.x + self.width).round() as i32,
            bottom: (self.y + self.height).round() as i32,
            left: self.x.round() as i32,
        }
    }
}

/// Integer pixel rectangle in `(top, right, bottom, left)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceLocation {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Face embedding vector (512-dimensional for ArcFace, 128 for dlib-style models).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. Zero vectors
    /// have similarity 0.0 with everything.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A face detected in one frame, with its embedding. Lives for one
/// frame-processing cycle.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// An enrolled reference face: one per reference image that contained
/// exactly one face.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownFace {
    pub label: String,
    pub embedding: Embedding,
    /// Reference image the embedding was extracted from.
    pub source: PathBuf,
}

/// The enrolled gallery. Immutable once built.
///
/// Entries are kept sorted by `(label, source)` so that iteration order,
/// and with it the matcher's tie-break, does not depend on directory
/// traversal order.
#[derive(Debug, Clone, Default)]
pub struct KnownFaces {
    faces: Vec<KnownFace>,
}

impl KnownFaces {
    pub fn new(mut faces: Vec<KnownFace>) -> Self {
        faces.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.source.cmp(&b.source)));
        Self { faces }
    }

    pub fn as_slice(&self) -> &[KnownFace] {
        &self.faces
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KnownFace> {
        self.faces.iter()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Distinct labels with the number of reference embeddings each.
    pub fn label_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for face in &self.faces {
            match counts.last_mut() {
                Some((label, n)) if *label == face.label => *n += 1,
                _ => counts.push((face.label.clone(), 1)),
            }
        }
        counts
    }
}

impl<'a> IntoIterator for &'a KnownFaces {
    type Item = &'a KnownFace;
    type IntoIter = std::slice::Iter<'a, KnownFace>;

    fn into_iter(self) -> Self::IntoIter {
        self.faces.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(label: &str, source: &str) -> KnownFace {
        KnownFace {
            label: label.into(),
            embedding: Embedding::new(vec![0.0]),
            source: PathBuf::from(source),
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_location_order() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 40.0, 0.9);
        let loc = bbox.location();
        assert_eq!(
            loc,
            FaceLocation {
                top: 20,
                right: 40,
                bottom: 60,
                left: 10
            }
        );
        assert_eq!(loc.width(), 30);
        assert_eq!(loc.height(), 40);
    }

    #[test]
    fn test_known_faces_sorted_by_label_then_source() {
        let faces = KnownFaces::new(vec![
            known("carol", "people/carol/1.jpg"),
            known("alice", "people/alice/2.jpg"),
            known("alice", "people/alice/1.jpg"),
        ]);
        let order: Vec<_> = faces
            .iter()
            .map(|f| (f.label.as_str(), f.source.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("alice", "people/alice/1.jpg".to_string()),
                ("alice", "people/alice/2.jpg".to_string()),
                ("carol", "people/carol/1.jpg".to_string()),
            ]
        );
    }

    #[test]
    fn test_label_counts() {
        let faces = KnownFaces::new(vec![
            known("bob", "b1"),
            known("alice", "a1"),
            known("bob", "b2"),
        ]);
        assert_eq!(
            faces.label_counts(),
            vec![("alice".to_string(), 1), ("bob".to_string(), 2)]
        );
    }
}

//! Face analysis capability: detection plus embedding extraction.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detection failed: {0}")]
    Detection(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Detects faces in an RGB image and turns each one into an embedding.
pub trait FaceAnalyzer {
    /// Find all faces in the image, in detector order.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// Extract the embedding for one detected face.
    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, AnalyzerError>;
}

impl<T: FaceAnalyzer + ?Sized> FaceAnalyzer for Box<T> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        (**self).detect(image)
    }

    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, AnalyzerError> {
        (**self).embed(image, face)
    }
}

/// SCRFD detection followed by ArcFace embedding, both via ONNX Runtime.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxAnalyzer {
    /// Detection model file name inside the model directory.
    pub const DETECTOR_FILE: &'static str = "det_10g.onnx";
    /// Recognition model file name inside the model directory.
    pub const RECOGNIZER_FILE: &'static str = "w600k_r50.onnx";

    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(&model_dir.join(Self::DETECTOR_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(Self::RECOGNIZER_FILE))?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector.detect(image)?)
    }

    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, AnalyzerError> {
        Ok(self.recognizer.extract(image, face)?)
    }
}

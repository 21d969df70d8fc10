//! Per-frame recognition: detect, embed, match, record, annotate.

use crate::analyzer::FaceAnalyzer;
use crate::annotate::{Annotation, Annotator};
use crate::ledger::AttendanceLedger;
use crate::matcher::Matcher;
use crate::types::{DetectedFace, KnownFaces};
use image::RgbImage;

/// Output of one frame.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// The frame, with recognized faces drawn on it.
    pub image: RgbImage,
    pub annotations: Vec<Annotation>,
    /// Names recorded for the first time during this frame.
    pub newly_recorded: Vec<String>,
    /// Faces the detector reported, recognized or not.
    pub faces_detected: usize,
}

impl ProcessedFrame {
    fn untouched(image: RgbImage) -> Self {
        Self {
            image,
            annotations: Vec::new(),
            newly_recorded: Vec::new(),
            faces_detected: 0,
        }
    }
}

/// Read-only recognition state shared by every frame of a session.
pub struct FramePipeline {
    known: KnownFaces,
    matcher: Box<dyn Matcher + Send + Sync>,
    threshold: f32,
    annotator: Annotator,
}

impl FramePipeline {
    pub fn new(
        known: KnownFaces,
        matcher: Box<dyn Matcher + Send + Sync>,
        threshold: f32,
        annotator: Annotator,
    ) -> Self {
        Self {
            known,
            matcher,
            threshold,
            annotator,
        }
    }

    pub fn known(&self) -> &KnownFaces {
        &self.known
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Process one RGB frame.
    ///
    /// A detector failure returns the frame unchanged. A failure on one face
    /// skips that face only. Every recognized face is drawn on every frame,
    /// whether or not it was newly recorded.
    pub fn process<A: FaceAnalyzer + ?Sized>(
        &self,
        analyzer: &mut A,
        ledger: &mut AttendanceLedger,
        frame: RgbImage,
    ) -> ProcessedFrame {
        let boxes = match analyzer.detect(&frame) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "error processing frame");
                return ProcessedFrame::untouched(frame);
            }
        };

        let faces_detected = boxes.len();
        let mut annotations = Vec::new();
        let mut newly_recorded = Vec::new();

        for (i, bbox) in boxes.into_iter().enumerate() {
            let face = match analyzer.embed(&frame, &bbox) {
                Ok(embedding) => DetectedFace { bbox, embedding },
                Err(e) => {
                    tracing::warn!(face = i, error = %e, "skipping face: embedding failed");
                    continue;
                }
            };

            let result = self
                .matcher
                .best_match(&face.embedding, self.known.as_slice(), self.threshold);
            let (Some(label), Some(distance)) = (result.label, result.distance) else {
                tracing::trace!(face = i, distance = ?result.distance, "face not recognized");
                continue;
            };

            if ledger.record_if_absent(&label) {
                newly_recorded.push(label.clone());
            }
            annotations.push(Annotation {
                location: face.bbox.location(),
                label,
                distance,
            });
        }

        let mut image = frame;
        for annotation in &annotations {
            self.annotator.draw(&mut image, annotation);
        }

        ProcessedFrame {
            image,
            annotations,
            newly_recorded,
            faces_detected,
        }
    }
}

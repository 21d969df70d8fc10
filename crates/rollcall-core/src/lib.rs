//! rollcall-core: face enrollment, matching and the attendance ledger.
//!
//! Faces are found with SCRFD and embedded with ArcFace, both through ONNX
//! Runtime on the CPU. Recognized names are written once to an Excel
//! attendance sheet.

pub mod alignment;
pub mod analyzer;
pub mod annotate;
pub mod detector;
pub mod enroll;
pub mod ledger;
pub mod matcher;
pub mod pipeline;
pub mod recognizer;
pub mod session;
pub mod store;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use annotate::{Annotation, Annotator};
pub use enroll::{enroll, EnrollError, EnrollReport};
pub use ledger::{AttendanceLedger, AttendanceRecord};
pub use matcher::{
    DistanceMetric, MatchResult, Matcher, DEFAULT_COSINE_THRESHOLD, DEFAULT_EUCLIDEAN_THRESHOLD,
};
pub use pipeline::{FramePipeline, ProcessedFrame};
pub use session::{
    FrameSink, FrameSource, Session, SessionError, SessionSettings, SessionState, SessionSummary,
    StopReason,
};
pub use store::{LedgerStore, MemoryStore, StoreError, XlsxStore};
pub use types::{BoundingBox, DetectedFace, Embedding, FaceLocation, KnownFace, KnownFaces};

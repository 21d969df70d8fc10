//! Session driver: camera lifecycle, enrollment and the capture loop.
//!
//! ```text
//! Idle -> CameraOpen -> Running -> Stopping -> Closed
//! ```
//!
//! The frame source and display sink are owned by [`Session::run`] and
//! dropped on every exit path, so their `Drop` impls release the device and
//! window whether the loop ends by quit, exhaustion or error.

use crate::analyzer::FaceAnalyzer;
use crate::annotate::Annotator;
use crate::enroll::{self, EnrollError, EnrollReport};
use crate::ledger::AttendanceLedger;
use crate::matcher::DistanceMetric;
use crate::pipeline::{FramePipeline, ProcessedFrame};
use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Produces RGB frames, e.g. a camera.
pub trait FrameSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Next frame, or `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, Self::Error>;
}

/// Shows processed frames and reports the user's quit request.
pub trait FrameSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn show(&mut self, frame: &ProcessedFrame) -> Result<(), Self::Error>;

    /// True once the user asked to stop.
    fn quit_requested(&mut self) -> bool;
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("could not open camera: {0}")]
    Camera(#[source] BoxError),
    #[error("enrollment failed: {0}")]
    Enroll(#[from] EnrollError),
    #[error("could not open display: {0}")]
    Display(#[source] BoxError),
    #[error("session already ran")]
    AlreadyRan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CameraOpen,
    Running,
    Stopping,
    Closed,
}

/// Why the capture loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Quit,
    SourceExhausted,
    SourceFailed(String),
    DisplayFailed(String),
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub frames: u64,
    pub stop_reason: StopReason,
    /// Names first recorded during this session, in order.
    pub newly_recorded: Vec<String>,
    pub enroll_report: EnrollReport,
}

/// Construction-time session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub people_dir: PathBuf,
    pub match_threshold: f32,
    pub metric: DistanceMetric,
    pub font_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let metric = DistanceMetric::default();
        Self {
            people_dir: PathBuf::from("people"),
            match_threshold: metric.default_threshold(),
            metric,
            font_path: None,
        }
    }
}

/// One attendance session. Owns the analyzer and the ledger; the known
/// faces live in the pipeline built during [`Session::run`].
pub struct Session<A: FaceAnalyzer> {
    settings: SessionSettings,
    analyzer: A,
    ledger: AttendanceLedger,
    state: SessionState,
}

impl<A: FaceAnalyzer> Session<A> {
    pub fn new(settings: SessionSettings, analyzer: A, ledger: AttendanceLedger) -> Self {
        Self {
            settings,
            analyzer,
            ledger,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn ledger(&self) -> &AttendanceLedger {
        &self.ledger
    }

    fn transition(&mut self, to: SessionState) {
        tracing::debug!(from = ?self.state, to = ?to, "session state");
        self.state = to;
    }

    /// Open the source, enroll, open the sink, then loop until quit or the
    /// source stops. Returns an error only for initialization failures.
    pub fn run<S, D, OS, OD>(&mut self, open_source: OS, open_sink: OD) -> Result<SessionSummary, SessionError>
    where
        S: FrameSource,
        D: FrameSink,
        OS: FnOnce() -> Result<S, S::Error>,
        OD: FnOnce() -> Result<D, D::Error>,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyRan);
        }

        let result = self.run_inner(open_source, open_sink);
        // Source and sink were owned by run_inner and have been dropped.
        self.transition(SessionState::Closed);
        if let Ok(summary) = &result {
            tracing::info!(
                frames = summary.frames,
                reason = ?summary.stop_reason,
                recorded = summary.newly_recorded.len(),
                "session closed"
            );
        }
        result
    }

    fn run_inner<S, D, OS, OD>(&mut self, open_source: OS, open_sink: OD) -> Result<SessionSummary, SessionError>
    where
        S: FrameSource,
        D: FrameSink,
        OS: FnOnce() -> Result<S, S::Error>,
        OD: FnOnce() -> Result<D, D::Error>,
    {
        let mut source = open_source().map_err(|e| SessionError::Camera(Box::new(e)))?;
        self.transition(SessionState::CameraOpen);

        let (known, enroll_report) = enroll::enroll(&self.settings.people_dir, &mut self.analyzer)?;
        let pipeline = FramePipeline::new(
            known,
            self.settings.metric.matcher(),
            self.settings.match_threshold,
            Annotator::discover(self.settings.font_path.as_deref()),
        );

        let mut sink = open_sink().map_err(|e| SessionError::Display(Box::new(e)))?;
        self.transition(SessionState::Running);
        tracing::info!(
            known_faces = pipeline.known().len(),
            threshold = pipeline.threshold(),
            "starting face recognition"
        );

        let mut frames = 0u64;
        let mut newly_recorded = Vec::new();

        let stop_reason = loop {
            let frame = match source.next_frame() {
                Ok(Some(f)) => f,
                Ok(None) => {
                    tracing::info!("frame source exhausted");
                    break StopReason::SourceExhausted;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to grab frame");
                    break StopReason::SourceFailed(e.to_string());
                }
            };
            frames += 1;

            let processed = pipeline.process(&mut self.analyzer, &mut self.ledger, frame);
            newly_recorded.extend(processed.newly_recorded.iter().cloned());

            if let Err(e) = sink.show(&processed) {
                tracing::error!(error = %e, "display failed");
                break StopReason::DisplayFailed(e.to_string());
            }
            if sink.quit_requested() {
                tracing::info!("quit requested");
                break StopReason::Quit;
            }
        };

        self.transition(SessionState::Stopping);
        drop(sink);
        drop(source);

        Ok(SessionSummary {
            frames,
            stop_reason,
            newly_recorded,
            enroll_report,
        })
    }
}

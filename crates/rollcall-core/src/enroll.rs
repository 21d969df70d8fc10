//! Builds the known-face gallery from a directory of labelled reference images.
//!
//! Layout: `<base>/<label>/<image>`. Every image that contains exactly one
//! face contributes one [`KnownFace`]; everything else is skipped.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::{KnownFace, KnownFaces};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("cannot read enrollment directory {path}: {source}")]
    BaseDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("enrollment path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Why a single reference image did not produce a known face.
#[derive(Error, Debug)]
pub enum ReferenceImageError {
    #[error("decode: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// What enrollment of one image produced.
#[derive(Debug)]
pub enum ImageOutcome {
    Enrolled(KnownFace),
    NoFace,
    MultipleFaces(usize),
}

/// Tally of one enrollment scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrollReport {
    pub enrolled: usize,
    pub no_face: usize,
    pub multiple_faces: usize,
    pub failed: usize,
}

impl EnrollReport {
    pub fn scanned(&self) -> usize {
        self.enrolled + self.no_face + self.multiple_faces + self.failed
    }
}

/// Scan `base` and build the gallery.
///
/// A missing or unreadable `base` is fatal. Unreadable label directories and
/// images that fail to decode or analyze are logged and skipped.
pub fn enroll<A: FaceAnalyzer + ?Sized>(
    base: &Path,
    analyzer: &mut A,
) -> Result<(KnownFaces, EnrollReport), EnrollError> {
    let meta = fs::metadata(base).map_err(|source| EnrollError::BaseDir {
        path: base.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(EnrollError::NotADirectory(base.to_path_buf()));
    }

    let entries = fs::read_dir(base).map_err(|source| EnrollError::BaseDir {
        path: base.to_path_buf(),
        source,
    })?;

    let mut faces = Vec::new();
    let mut report = EnrollReport::default();

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let label_dir = entry.path();
        if !label_dir.is_dir() {
            continue;
        }
        let Some(label) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!(path = %label_dir.display(), "skipping label directory with non-UTF-8 name");
            continue;
        };

        for image_path in label_images(&label_dir) {
            match enroll_image(&label, &image_path, analyzer) {
                Ok(ImageOutcome::Enrolled(face)) => {
                    tracing::info!(label = %label, image = %image_path.display(), "loaded reference face");
                    report.enrolled += 1;
                    faces.push(face);
                }
                Ok(ImageOutcome::NoFace) => {
                    tracing::info!(image = %image_path.display(), "skipping reference image: no face");
                    report.no_face += 1;
                }
                Ok(ImageOutcome::MultipleFaces(n)) => {
                    tracing::info!(image = %image_path.display(), faces = n, "skipping reference image: more than one face");
                    report.multiple_faces += 1;
                }
                Err(e) => {
                    tracing::warn!(image = %image_path.display(), error = %e, "error processing reference image");
                    report.failed += 1;
                }
            }
        }
    }

    let faces = KnownFaces::new(faces);
    tracing::info!(
        enrolled = report.enrolled,
        labels = faces.label_counts().len(),
        no_face = report.no_face,
        multiple_faces = report.multiple_faces,
        failed = report.failed,
        "enrollment complete"
    );
    Ok((faces, report))
}

/// Regular files inside one label directory. Read errors are logged and
/// yield an empty list.
fn label_images(label_dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(label_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            tracing::warn!(path = %label_dir.display(), error = %e, "cannot read label directory");
            Vec::new()
        }
    }
}

/// Decode one reference image and analyze it.
pub fn enroll_image<A: FaceAnalyzer + ?Sized>(
    label: &str,
    path: &Path,
    analyzer: &mut A,
) -> Result<ImageOutcome, ReferenceImageError> {
    let image = image::open(path)?.to_rgb8();
    enroll_decoded(label, path, &image, analyzer)
}

fn enroll_decoded<A: FaceAnalyzer + ?Sized>(
    label: &str,
    path: &Path,
    image: &RgbImage,
    analyzer: &mut A,
) -> Result<ImageOutcome, ReferenceImageError> {
    let boxes = analyzer.detect(image)?;
    match boxes.as_slice() {
        [] => Ok(ImageOutcome::NoFace),
        [single] => {
            let embedding = analyzer.embed(image, single)?;
            Ok(ImageOutcome::Enrolled(KnownFace {
                label: label.to_string(),
                embedding,
                source: path.to_path_buf(),
            }))
        }
        many => Ok(ImageOutcome::MultipleFaces(many.len())),
    }
}

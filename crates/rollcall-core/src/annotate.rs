//! Drawing of recognized faces onto frames.

use crate::types::FaceLocation;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Box colour for recognized faces.
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Label colour for recognized faces.
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 165, 0]);

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 24.0;
const LABEL_GAP: i32 = 10;

/// DejaVu Sans, used when no configured or system font loads.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Fonts tried, in order, when none is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

#[derive(Error, Debug)]
pub enum FontError {
    #[error("read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a usable TrueType/OpenType font")]
    Invalid(PathBuf),
}

/// A recognized face to draw on a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub location: FaceLocation,
    pub label: String,
    pub distance: f32,
}

/// Draws boxes and, when a font is available, name labels.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// Annotator that draws boxes only.
    pub fn boxes_only() -> Self {
        Self { font: None }
    }

    pub fn with_font_file(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|_| FontError::Invalid(path.to_path_buf()))?;
        Ok(Self { font: Some(font) })
    }

    /// Annotator using the font compiled into the crate. Draws boxes only
    /// if that font fails to parse.
    pub fn bundled() -> Self {
        match FontVec::try_from_vec(BUNDLED_FONT.to_vec()) {
            Ok(font) => Self { font: Some(font) },
            Err(e) => {
                tracing::warn!(error = %e, "bundled label font unusable; recognized faces are drawn without names");
                Self::boxes_only()
            }
        }
    }

    /// Use `configured` if given, else the first system font that loads,
    /// else the bundled font.
    pub fn discover(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::with_font_file(path) {
                Ok(a) => return a,
                Err(e) => tracing::warn!(error = %e, "configured label font unusable"),
            }
        }
        for candidate in SYSTEM_FONTS {
            let path = Path::new(candidate);
            if !path.exists() {
                continue;
            }
            if let Ok(a) = Self::with_font_file(path) {
                tracing::debug!(font = %path.display(), "using label font");
                return a;
            }
        }
        tracing::debug!("no system label font found, using bundled font");
        Self::bundled()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw one annotation onto `image`.
    pub fn draw(&self, image: &mut RgbImage, annotation: &Annotation) {
        let loc = annotation.location;
        let (w, h) = (image.width() as i32, image.height() as i32);
        if w == 0 || h == 0 {
            return;
        }

        for inset in 0..BOX_THICKNESS {
            let left = (loc.left + inset).clamp(0, w - 1);
            let top = (loc.top + inset).clamp(0, h - 1);
            let right = (loc.right - inset).clamp(0, w - 1);
            let bottom = (loc.bottom - inset).clamp(0, h - 1);
            if right <= left || bottom <= top {
                break;
            }
            let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }

        if let Some(font) = &self.font {
            let y = (loc.top - LABEL_GAP - LABEL_SCALE as i32).max(0);
            draw_text_mut(
                image,
                LABEL_COLOR,
                loc.left.max(0),
                y,
                PxScale::from(LABEL_SCALE),
                font,
                &annotation.label,
            );
        }
    }
}

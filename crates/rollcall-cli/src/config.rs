use anyhow::{bail, Context, Result};
use rollcall_core::{DistanceMetric, SessionSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rollcall.toml";

/// Runtime configuration.
///
/// Resolved as defaults, then the TOML file, then `ROLLCALL_*` environment
/// variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Enrollment directory: one subdirectory of reference images per person.
    pub people_dir: PathBuf,
    /// Attendance workbook.
    pub ledger_path: PathBuf,
    /// Maximum embedding distance accepted as a match. Unset means the
    /// metric's ArcFace default (1.1 Euclidean, 0.6 cosine).
    pub match_threshold: Option<f32>,
    pub metric: DistanceMetric,
    /// V4L2 index, i.e. `/dev/video{camera_index}`.
    pub camera_index: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Directory containing the SCRFD and ArcFace ONNX models.
    pub model_dir: PathBuf,
    /// TrueType font for name labels. Common system fonts are tried if unset.
    pub font_path: Option<PathBuf>,
    /// Run without a preview window.
    pub headless: bool,
    pub window_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            people_dir: PathBuf::from("people"),
            ledger_path: PathBuf::from("attendance.xlsx"),
            match_threshold: None,
            metric: DistanceMetric::Euclidean,
            camera_index: 0,
            frame_width: 640,
            frame_height: 480,
            model_dir: PathBuf::from("models"),
            font_path: None,
            headless: false,
            window_title: "Video".to_string(),
        }
    }
}

impl Config {
    /// Defaults overlaid with the config file and the process environment.
    ///
    /// An explicit `path` must exist; the implicit `rollcall.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Overlay `ROLLCALL_*` variables. Unparseable values are logged and
    /// ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("ROLLCALL_PEOPLE_DIR") {
            self.people_dir = PathBuf::from(v);
        }
        if let Some(v) = var("ROLLCALL_LEDGER_PATH") {
            self.ledger_path = PathBuf::from(v);
        }
        if let Some(v) = var("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = var("ROLLCALL_FONT_PATH") {
            self.font_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("ROLLCALL_WINDOW_TITLE") {
            self.window_title = v;
        }
        if let Some(raw) = var("ROLLCALL_MATCH_THRESHOLD") {
            match raw.trim().parse::<f32>() {
                Ok(v) => self.match_threshold = Some(v),
                Err(e) => tracing::warn!(key = "ROLLCALL_MATCH_THRESHOLD", value = %raw, error = %e, "ignoring invalid environment value"),
            }
        }
        env_parse(&var, "ROLLCALL_METRIC", &mut self.metric);
        env_parse(&var, "ROLLCALL_CAMERA_INDEX", &mut self.camera_index);
        env_parse(&var, "ROLLCALL_FRAME_WIDTH", &mut self.frame_width);
        env_parse(&var, "ROLLCALL_FRAME_HEIGHT", &mut self.frame_height);
        if let Some(v) = var("ROLLCALL_HEADLESS") {
            self.headless = v != "0" && !v.eq_ignore_ascii_case("false");
        }
    }

    /// The configured threshold, or the metric's default.
    pub fn effective_threshold(&self) -> f32 {
        self.match_threshold.unwrap_or_else(|| self.metric.default_threshold())
    }

    pub fn validate(&self) -> Result<()> {
        let t = self.effective_threshold();
        if !t.is_finite() || t < 0.0 {
            bail!("match_threshold must be a non-negative number, got {t}");
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            bail!("frame size must be non-zero, got {}x{}", self.frame_width, self.frame_height);
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            people_dir: self.people_dir.clone(),
            match_threshold: self.effective_threshold(),
            metric: self.metric,
            font_path: self.font_path.clone(),
        }
    }
}

fn env_parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = var(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(e) => tracing::warn!(key, value = %raw, error = %e, "ignoring invalid environment value"),
    }
}

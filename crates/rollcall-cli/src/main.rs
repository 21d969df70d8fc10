use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rollcall_core::{
    AttendanceLedger, AttendanceRecord, DistanceMetric, LedgerStore, OnnxAnalyzer, Session,
    StopReason, XlsxStore,
};
use rollcall_hw::{Camera, NullDisplay, WindowDisplay};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "rollcall", about = "Webcam attendance with face recognition", version)]
struct Cli {
    /// Config file (default: ./rollcall.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that take precedence over the config file and environment.
#[derive(Args, Default)]
struct Overrides {
    /// Enrollment directory (one subdirectory per person)
    #[arg(long, global = true)]
    people_dir: Option<PathBuf>,
    /// Attendance workbook
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
    /// Maximum distance accepted as a match
    #[arg(long, global = true)]
    threshold: Option<f32>,
    /// Distance metric: euclidean or cosine
    #[arg(long, global = true)]
    metric: Option<DistanceMetric>,
    /// Camera index (/dev/videoN)
    #[arg(long, global = true)]
    camera: Option<usize>,
    /// Directory with det_10g.onnx and w600k_r50.onnx
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
    /// TrueType font for name labels
    #[arg(long, global = true)]
    font: Option<PathBuf>,
    /// Run without a preview window
    #[arg(long, global = true)]
    headless: bool,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.people_dir {
            config.people_dir = v;
        }
        if let Some(v) = self.ledger {
            config.ledger_path = v;
        }
        if let Some(v) = self.threshold {
            config.match_threshold = Some(v);
        }
        if let Some(v) = self.metric {
            config.metric = v;
        }
        if let Some(v) = self.camera {
            config.camera_index = v;
        }
        if let Some(v) = self.model_dir {
            config.model_dir = v;
        }
        if let Some(v) = self.font {
            config.font_path = Some(v);
        }
        if self.headless {
            config.headless = true;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run an attendance session (default)
    Run,
    /// Enroll reference images and print who was found, without a camera
    Enroll,
    /// Print the attendance ledger
    Ledger {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);
    config.validate()?;
    tracing::debug!(?config, "resolved configuration");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_session(&config),
        Commands::Enroll => enroll_only(&config),
        Commands::Ledger { json } => print_ledger(&config, json),
        Commands::Devices => {
            list_devices();
            Ok(())
        }
    }
}

fn run_session(config: &Config) -> Result<()> {
    let analyzer = OnnxAnalyzer::load(&config.model_dir)
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;
    let ledger = AttendanceLedger::load(XlsxStore::new(&config.ledger_path));
    let mut session = Session::new(config.session_settings(), analyzer, ledger);

    let open_camera = || Camera::open(config.camera_index, config.frame_width, config.frame_height);
    let summary = if config.headless {
        session.run(open_camera, || Ok(NullDisplay))
    } else {
        session.run(open_camera, || {
            WindowDisplay::open(&config.window_title, config.frame_width, config.frame_height)
        })
    }
    .context("attendance session failed")?;

    println!(
        "Processed {} frames, {} newly recorded ({} enrolled images)",
        summary.frames,
        summary.newly_recorded.len(),
        summary.enroll_report.enrolled
    );
    for name in &summary.newly_recorded {
        println!("  + {name}");
    }
    if let StopReason::SourceFailed(e) | StopReason::DisplayFailed(e) = &summary.stop_reason {
        eprintln!("Session ended early: {e}");
    }
    Ok(())
}

fn enroll_only(config: &Config) -> Result<()> {
    let mut analyzer = OnnxAnalyzer::load(&config.model_dir)
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;
    let (known, report) = rollcall_core::enroll(&config.people_dir, &mut analyzer)
        .with_context(|| format!("failed to enroll from {}", config.people_dir.display()))?;

    if known.is_empty() {
        println!("No faces enrolled from {}", config.people_dir.display());
    } else {
        println!("{:<24} IMAGES", "LABEL");
        for (label, count) in known.label_counts() {
            println!("{label:<24} {count}");
        }
    }
    println!(
        "\n{} images scanned: {} enrolled, {} without a face, {} with several faces, {} unreadable",
        report.scanned(),
        report.enrolled,
        report.no_face,
        report.multiple_faces,
        report.failed
    );
    Ok(())
}

fn print_ledger(config: &Config, json: bool) -> Result<()> {
    let store = XlsxStore::new(&config.ledger_path);
    let records: Vec<AttendanceRecord> = store
        .load()
        .with_context(|| format!("failed to read {}", config.ledger_path.display()))?
        .unwrap_or_default();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No attendance recorded in {}", config.ledger_path.display());
        return Ok(());
    }
    println!("{:<24} TIME", "NAME");
    for r in &records {
        println!("{:<24} {}", r.name, r.time);
    }
    Ok(())
}

fn list_devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for d in devices {
        println!("{:>2}  {:<14} {} ({}, {})", d.index, d.path, d.name, d.driver, d.bus);
    }
}

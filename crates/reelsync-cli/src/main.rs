//! ReelSync CLI
//!
//! Headless front end for the reconciliation engine and frame extractors.
//! Every command prints its result as pretty JSON on stdout. Logs go to
//! stderr and, with `--log-dir`, to a daily rolling file.
//!
//! Exit codes: 0 success, 1 failure, 2 duplicate conflict.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use reelsync::core::ffmpeg::{FFmpegInfo, FFmpegStatus, FfmpegDecoder, FfprobeProber};
use reelsync::core::frames::{
    parse_timestamp_list, JobStore, SceneExtractor, SceneOptions, TimestampExtractor,
    TimestampOptions,
};
use reelsync::core::inventory::DirectoryInventory;
use reelsync::core::library::{
    DownloadOutcome, DownloadRequest, RemoteStatus, UploadOutcome, VideoLibrary,
};
use reelsync::core::remote::{ChatMessage, HttpRemoteCatalog};
use reelsync::core::settings::{default_data_dir, Settings, SettingsManager};
use reelsync::core::sync::SqliteSyncStore;
use reelsync::core::CoreError;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFLICT: u8 = 2;

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "reelsync-cli", version, about = "Keep a remote video catalog and a local library in step")]
struct Cli {
    /// Directory holding settings.json (defaults to the platform data dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile remote, local and recorded videos and print the merged list
    List,
    /// Download a remote video into the upload directory
    Download {
        remote_id: String,
    },
    /// Upload a file from the upload directory
    Upload {
        local_name: String,
        /// Name shown in the remote catalog (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// Ask the remote service to ingest a video by URL
    UploadUrl {
        url: String,
        #[arg(long)]
        name: String,
    },
    /// Delete a local file and its sync record
    DeleteLocal {
        local_name: String,
    },
    /// Delete a remote video and its sync record
    DeleteRemote {
        remote_id: String,
    },
    /// Re-read a video's indexing status
    Refresh {
        remote_id: String,
    },
    /// Ask a question about an indexed remote video
    Ask {
        remote_id: String,
        question: String,
        /// JSON file with earlier messages: [{"role": ..., "content": ...}]
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Probe a local file
    Describe {
        local_name: String,
    },
    /// Report whether the remote catalog is configured
    Status,
    /// Extract still frames from a video
    Extract {
        #[command(subcommand)]
        mode: ExtractCommand,
    },
    /// Manage extraction output
    Jobs {
        #[command(subcommand)]
        action: JobsCommand,
    },
}

#[derive(Subcommand)]
enum ExtractCommand {
    /// Keyframes at scene changes
    Scene {
        /// Path, or a file name in the upload directory
        video: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        max_frames: Option<usize>,
    },
    /// Frames around the given timestamps
    Timestamps {
        video: PathBuf,
        /// Comma-separated seconds, e.g. 10.5,25,60.3
        #[arg(long)]
        at: String,
        #[arg(long)]
        frames_per_timestamp: Option<usize>,
    },
}

#[derive(Subcommand)]
enum JobsCommand {
    List,
    Frames { job: String },
    Delete { job: String },
    DeleteFrame { job: String, frame: String },
    /// Write a ZIP of the job's frames and manifest
    Package {
        job: String,
        /// Destination file (defaults to <job>.zip in the current directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            if let Some(CoreError::Conflict(conflict)) = e.downcast_ref::<CoreError>() {
                if print_json(conflict).is_ok() {
                    return ExitCode::from(EXIT_CONFLICT);
                }
            }
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_logging(log_dir: Option<&Path>) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let file_appender = tracing_appender::rolling::daily(dir, "reelsync.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = cli.config_dir.unwrap_or_else(default_data_dir);
    let settings = SettingsManager::new(&config_dir).load();

    match cli.command {
        Command::List => print_json(&open_library(&settings)?.list_videos()?),
        Command::Download { remote_id } => download(&settings, &remote_id),
        Command::Upload { local_name, name } => {
            let outcome = open_library(&settings)?.upload_local(&local_name, name.as_deref())?;
            let conflict = matches!(outcome, UploadOutcome::Duplicate(_));
            finish(&outcome, conflict)
        }
        Command::UploadUrl { url, name } => {
            print_json(&open_library(&settings)?.upload_from_url(&url, &name)?)
        }
        Command::DeleteLocal { local_name } => {
            print_json(&open_library(&settings)?.delete_local(&local_name)?)
        }
        Command::DeleteRemote { remote_id } => {
            print_json(&open_library(&settings)?.delete_remote(&remote_id)?)
        }
        Command::Refresh { remote_id } => {
            let status = open_library(&settings)?.refresh_status(&remote_id)?;
            print_json(&refresh_report(&remote_id, &status))
        }
        Command::Ask {
            remote_id,
            question,
            history,
        } => {
            let history = match history {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };
            print_json(&open_library(&settings)?.ask(&remote_id, &question, &history)?)
        }
        Command::Describe { local_name } => {
            print_json(&open_library(&settings)?.describe_local(&local_name)?)
        }
        Command::Status => {
            let remote = open_library(&settings)?.remote_status();
            let ffmpeg = FFmpegInfo::from_settings(&settings.ffmpeg).status();
            let code = if ffmpeg.available {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_FAILURE)
            };
            print_json(&status_report(remote, ffmpeg))?;
            Ok(code)
        }
        Command::Extract { mode } => extract(&settings, mode),
        Command::Jobs { action } => jobs(&settings, action),
    }
}

// =============================================================================
// Commands
// =============================================================================

fn open_library(settings: &Settings) -> Result<VideoLibrary> {
    let ffmpeg = FFmpegInfo::from_settings(&settings.ffmpeg);
    let storage = &settings.storage;

    let store = SqliteSyncStore::open(&storage.db_path)
        .with_context(|| format!("opening sync database {}", storage.db_path.display()))?;
    let remote = HttpRemoteCatalog::new(&settings.remote)?;
    std::fs::create_dir_all(&storage.upload_dir)
        .with_context(|| format!("creating upload directory {}", storage.upload_dir.display()))?;
    let inventory = DirectoryInventory::new(
        storage.upload_dir.clone(),
        Box::new(FfprobeProber::new(ffmpeg.clone())),
    );

    Ok(VideoLibrary::new(
        Box::new(store),
        Box::new(remote),
        Box::new(inventory),
        Box::new(FfprobeProber::new(ffmpeg)),
    )
    .with_group_id(&settings.remote.group_id))
}

fn download(settings: &Settings, remote_id: &str) -> Result<ExitCode> {
    let library = open_library(settings)?;
    let video = library.remote_video(remote_id)?;
    let Some(url) = video.url.clone() else {
        bail!("Remote video {} has no download URL yet", remote_id);
    };

    let outcome = library.download(&DownloadRequest {
        remote_id: video.video_id.clone(),
        url,
        display_name: video.name.clone(),
        indexing_status: Some(video.indexing_status.clone()),
    })?;
    let conflict = !matches!(outcome, DownloadOutcome::Completed(_));
    finish(&outcome, conflict)
}

fn extract(settings: &Settings, mode: ExtractCommand) -> Result<ExitCode> {
    let decoder = FfmpegDecoder::new(FFmpegInfo::from_settings(&settings.ffmpeg));
    let jobs = JobStore::new(settings.storage.output_dir.clone());
    let defaults = &settings.extraction;

    match mode {
        ExtractCommand::Scene {
            video,
            threshold,
            max_frames,
        } => {
            let video = resolve_video(settings, &video);
            let options = SceneOptions {
                threshold: threshold.unwrap_or(defaults.threshold),
                max_frames: max_frames.unwrap_or(defaults.max_frames),
                jpeg_quality: defaults.jpeg_quality,
            };
            let output = jobs.job_dir_for(&video)?;
            let manifest = SceneExtractor::new(&decoder).extract(&video, &output, &options)?;
            print_json(&manifest)
        }
        ExtractCommand::Timestamps {
            video,
            at,
            frames_per_timestamp,
        } => {
            let timestamps = parse_timestamp_list(&at)?;
            let video = resolve_video(settings, &video);
            let options = TimestampOptions {
                frames_per_timestamp: frames_per_timestamp.unwrap_or(defaults.frames_per_timestamp),
                jpeg_quality: defaults.jpeg_quality,
            };
            let output = jobs.job_dir_for(&video)?;
            let manifest =
                TimestampExtractor::new(&decoder).extract(&video, &output, &timestamps, &options)?;
            print_json(&manifest)
        }
    }
}

fn jobs(settings: &Settings, action: JobsCommand) -> Result<ExitCode> {
    let jobs = JobStore::new(settings.storage.output_dir.clone());

    match action {
        JobsCommand::List => print_json(&jobs.list_jobs()?),
        JobsCommand::Frames { job } => print_json(&jobs.list_frames(&job)?),
        JobsCommand::Delete { job } => {
            jobs.delete_job(&job)?;
            print_json(&serde_json::json!({ "deleted": job }))
        }
        JobsCommand::DeleteFrame { job, frame } => {
            jobs.delete_frame(&job, &frame)?;
            print_json(&serde_json::json!({ "job": job, "deleted": frame }))
        }
        JobsCommand::Package { job, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.zip", job)));
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let entries = match jobs.package_job(&job, BufWriter::new(file)) {
                Ok(entries) => entries,
                Err(e) => {
                    let _ = std::fs::remove_file(&output);
                    return Err(e.into());
                }
            };
            print_json(&serde_json::json!({ "archive": output, "entries": entries }))
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Bare names that do not exist as given are looked up in the upload directory
fn resolve_video(settings: &Settings, video: &Path) -> PathBuf {
    if video.exists() || video.components().count() > 1 {
        return video.to_path_buf();
    }
    settings.storage.upload_dir.join(video)
}

fn refresh_report(remote_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({ "remote_id": remote_id, "indexing_status": status })
}

fn status_report(remote: RemoteStatus, ffmpeg: FFmpegStatus) -> serde_json::Value {
    serde_json::json!({ "remote": remote, "ffmpeg": ffmpeg })
}

fn read_history(path: &Path) -> Result<Vec<ChatMessage>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading history {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing history {}", path.display()))
}

fn finish<T: Serialize>(value: &T, conflict: bool) -> Result<ExitCode> {
    print_json(value)?;
    Ok(if conflict {
        ExitCode::from(EXIT_CONFLICT)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(ExitCode::SUCCESS)
}

//! `rollcall`: operator tool for the local roster cache.
//!
//! Reads `rollcall.toml` (or the path given with `--config`), opens the
//! SQLite cache and the artifact directory once, and runs one subcommand.
//!
//! ```
//! rollcall sync snapshot.json --atomic
//! rollcall enroll S-104 --frame frame.jpg --crop crop.jpg --face face.jpg
//! rollcall delete S-104
//! rollcall inbox --unread
//! ```

mod config;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rollcall_artifacts::FsArtifactStore;
use rollcall_core::{
  Pid,
  attendance::{AttendanceMethod, NewAttendance},
  biometric::FaceCapture,
  notification::IncomingNotification,
  snapshot::RemoteSnapshot,
};
use rollcall_engine::{NotificationInbox, ProfileManager, SyncEngine};
use rollcall_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Local roster cache and profile lifecycle")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "rollcall.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Merge a remote snapshot (JSON) into the cache.
  Sync {
    snapshot: PathBuf,
    /// Apply the snapshot in one transaction.
    #[arg(long)]
    atomic:   bool,
  },
  /// List cached students missing from a snapshot.
  Stale { snapshot: PathBuf },
  /// Show one student and their biometric status.
  Student { pid: Pid },
  /// Delete a student's profile, embeddings and face images.
  Delete { pid: Pid },
  /// Store the three face images for a student.
  Enroll {
    pid:   Pid,
    #[arg(long)]
    frame: PathBuf,
    #[arg(long)]
    crop:  PathBuf,
    #[arg(long)]
    face:  PathBuf,
  },
  /// Finish interrupted deletions and remove orphaned images.
  Sweep,
  /// Store a notification as if it had just been delivered.
  Notify {
    #[arg(long)]
    title:   String,
    #[arg(long, default_value = "")]
    body:    String,
    #[arg(long, default_value = "general")]
    channel: String,
  },
  /// List notifications, most recent first.
  Inbox {
    #[arg(long)]
    unread: bool,
  },
  /// Mark one notification, or all of them, as read.
  Read {
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    id:  Option<i64>,
    #[arg(long)]
    all: bool,
  },
  /// Delete every notification.
  ClearInbox,
  /// Record attendance for a student.
  Attend {
    pid:    Pid,
    #[arg(long)]
    group:  Option<i64>,
    #[arg(long, default_value = "manual")]
    method: AttendanceMethod,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let mut cfg = AppConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let artifacts = FsArtifactStore::open(&cfg.artifact_dir)
    .await
    .with_context(|| format!("failed to open artifact dir {:?}", cfg.artifact_dir))?;
  let store = Arc::new(store);
  let artifacts = Arc::new(artifacts);

  match cli.command {
    Command::Sync { snapshot, atomic } => {
      cfg.sync.atomic |= atomic;
      let engine = SyncEngine::new(store, cfg.sync);
      let report = engine.sync(read_snapshot(&snapshot).await?).await?;
      println!(
        "villages {} groups {} students {} volunteers {}",
        report.villages, report.groups, report.students, report.volunteers
      );
      for pid in report.deferred {
        println!("deferred {pid}");
      }
    }

    Command::Stale { snapshot } => {
      let engine = SyncEngine::new(store, cfg.sync);
      for pid in engine.stale_students(&read_snapshot(&snapshot).await?).await? {
        println!("{pid}");
      }
    }

    Command::Student { pid } => {
      let profiles = ProfileManager::new(store, artifacts);
      let Some(student) = profiles.get_student_details(pid.clone()).await? else {
        anyhow::bail!("no student with pid {pid}");
      };
      let presence = profiles.artifact_presence(pid.clone()).await?;
      let embeddings = profiles.get_embeddings(pid).await?.len();
      let out = serde_json::json!({
        "student": student,
        "artifacts": presence,
        "embeddings": embeddings,
      });
      println!("{}", serde_json::to_string_pretty(&out)?);
    }

    Command::Delete { pid } => {
      let report = ProfileManager::new(store, artifacts).delete_student_profile(pid).await?;
      if report.existed {
        println!("deleted {} ({} files removed)", report.pid, report.files_removed);
      } else {
        println!("nothing to delete for {}", report.pid);
      }
    }

    Command::Enroll { pid, frame, crop, face } => {
      let capture = FaceCapture {
        raw_frame:       read_file(&frame).await?,
        face_crop:       read_file(&crop).await?,
        normalized_face: read_file(&face).await?,
      };
      let records = ProfileManager::new(store, artifacts).save_face_artifacts(pid, capture).await?;
      for r in records {
        println!("{} {} {}", r.kind, r.byte_len, r.content_hash);
      }
    }

    Command::Sweep => {
      let report = ProfileManager::new(store, artifacts).sweep().await?;
      println!(
        "redriven {} revived {} orphans {} failed {}",
        report.redriven.len(),
        report.revived.len(),
        report.orphans_removed.len(),
        report.failed.len()
      );
      if !report.failed.is_empty() {
        anyhow::bail!("{} deletions still incomplete", report.failed.len());
      }
    }

    Command::Notify { title, body, channel } => {
      let inbox = NotificationInbox::new(store, cfg.inbox);
      let incoming = IncomingNotification { title, body, channel_id: channel, timestamp: None };
      match inbox.ingest(incoming).await? {
        Some(n) => println!("{} {}", n.id, n.kind),
        None => println!("duplicate dropped"),
      }
    }

    Command::Inbox { unread } => {
      let inbox = NotificationInbox::new(store, cfg.inbox);
      for n in inbox.notifications().await? {
        if unread && n.is_read {
          continue;
        }
        let mark = if n.is_read { ' ' } else { '*' };
        println!("{mark} {:>5} {} [{}] {}", n.id, n.timestamp.format("%F %R"), n.kind, n.title);
      }
      println!("{} unread", inbox.unread_count().await?);
    }

    Command::Read { id, all } => {
      let inbox = NotificationInbox::new(store, cfg.inbox);
      match (id, all) {
        (_, true) => println!("{} marked read", inbox.mark_all_read().await?),
        (Some(id), false) => inbox.mark_read(id).await?,
        (None, false) => anyhow::bail!("give a notification id or --all"),
      }
    }

    Command::ClearInbox => NotificationInbox::new(store, cfg.inbox).delete_all().await?,

    Command::Attend { pid, group, method } => {
      let input = NewAttendance { pid, group_id: group, method, marked_at: None };
      let a = ProfileManager::new(store, artifacts).record_attendance(input).await?;
      println!("{} {} {}", a.attendance_id, a.pid, a.marked_at.to_rfc3339());
    }
  }

  Ok(())
}

async fn read_snapshot(path: &Path) -> anyhow::Result<RemoteSnapshot> {
  let raw = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("reading snapshot {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

async fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
  tokio::fs::read(path).await.with_context(|| format!("reading {}", path.display()))
}

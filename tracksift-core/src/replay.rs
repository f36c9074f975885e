// Replay of recorded capture files into the capture store

use crate::error::{CoreError, Result};
use crate::event::InteractionEvent;
use crate::session::{ClosedSession, RequestSource, Session, SessionRecorder};
use crate::store::CaptureStore;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};
use tracksift_capture::{FilterPolicy, RawRequestRecord};

/// One line of a capture file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureRecord {
    SessionStart {
        #[serde(default)]
        session_id: Option<String>,
        start_url: String,
        timestamp: DateTime<Utc>,
    },
    Interaction(InteractionEvent),
    Request(RawRequestRecord),
    /// Drain point: requests seen since the previous checkpoint belong to `action`.
    Checkpoint {
        page_url: String,
        action: String,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        timestamp: DateTime<Utc>,
    },
    SessionAbort {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Request source fed from a capture file; requests wait here until the next checkpoint.
#[derive(Debug, Default)]
pub struct ReplaySource {
    pending: Vec<RawRequestRecord>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: RawRequestRecord) {
        self.pending.push(record);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl RequestSource for ReplaySource {
    fn drain_requests(&mut self) -> Vec<RawRequestRecord> {
        std::mem::take(&mut self.pending)
    }
}

/// Replay one capture stream into closed sessions.
///
/// A session still open at the end of the stream, or when another one starts,
/// is closed as partial. Lines that fail to decode or parse are skipped with a warning.
pub fn replay_capture<R: BufRead>(reader: R, policy: &FilterPolicy, origin: &str) -> Result<Vec<ClosedSession>> {
    let mut closed = Vec::new();
    let mut recorder: Option<SessionRecorder> = None;
    let mut source = ReplaySource::new();
    let mut last_seen: Option<DateTime<Utc>> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            // The reader has already consumed the bad bytes, so the next line is intact
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(file = origin, line = idx + 1, error = %e, "skipping undecodable capture line");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let record: CaptureRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(file = origin, line = idx + 1, error = %e, "skipping malformed capture line");
                continue;
            }
        };

        match record {
            CaptureRecord::SessionStart {
                session_id,
                start_url,
                timestamp,
            } => {
                if let Some(open) = recorder.take() {
                    closed.push(open.abort_at("capture interrupted by a new session", timestamp));
                }
                discard_pending(&mut source, origin);
                let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                let session = Session::with_id(&session_id, &start_url, timestamp);
                recorder = Some(SessionRecorder::resume(session, policy.clone()));
                last_seen = Some(timestamp);
            }
            CaptureRecord::Interaction(event) => {
                last_seen = Some(event.timestamp);
                match recorder.as_mut() {
                    Some(open) => open.record_interaction(event),
                    None => warn!(file = origin, line = idx + 1, "interaction outside a session"),
                }
            }
            CaptureRecord::Request(request) => {
                last_seen = Some(request.timestamp);
                source.observe(request);
            }
            CaptureRecord::Checkpoint {
                page_url,
                action,
                timestamp,
            } => {
                last_seen = Some(timestamp);
                match recorder.as_mut() {
                    Some(open) => {
                        open.capture_network_at(&mut source, &page_url, &action, timestamp);
                    }
                    None => {
                        warn!(file = origin, line = idx + 1, "checkpoint outside a session");
                        discard_pending(&mut source, origin);
                    }
                }
            }
            CaptureRecord::SessionEnd { timestamp } => {
                if let Some(open) = recorder.take() {
                    closed.push(open.finish_at(timestamp));
                }
                discard_pending(&mut source, origin);
                last_seen = Some(timestamp);
            }
            CaptureRecord::SessionAbort { reason, timestamp } => {
                if let Some(open) = recorder.take() {
                    closed.push(open.abort_at(&reason, timestamp));
                }
                discard_pending(&mut source, origin);
                last_seen = Some(timestamp);
            }
        }
    }

    if let Some(open) = recorder.take() {
        let at = last_seen.unwrap_or(open.session().started_at);
        closed.push(open.abort_at("capture ended before the session was closed", at));
    }
    discard_pending(&mut source, origin);

    Ok(closed)
}

// Requests never reached by a checkpoint are not attributed to any action
fn discard_pending(source: &mut ReplaySource, origin: &str) {
    let dropped = source.drain_requests().len();
    if dropped > 0 {
        debug!(file = origin, dropped, "requests after the last checkpoint discarded");
    }
}

/// Options for configuring a replay operation
pub struct ReplayOptions {
    pub capture_files: Vec<PathBuf>,
    pub db_path: PathBuf,
    pub workers: usize,
    pub policy: FilterPolicy,
    pub show_progress_bars: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub session_id: String,
    pub session_start_url: String,
    pub interactions: usize,
    pub network_events: usize,
    pub partial: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub files_processed: usize,
    pub failed_files: Vec<(PathBuf, String)>,
    pub sessions: Vec<SessionOutcome>,
}

impl ReplaySummary {
    pub fn partial_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.partial).count()
    }

    pub fn network_events(&self) -> usize {
        self.sessions.iter().map(|s| s.network_events).sum()
    }
}

/// Replay capture files concurrently and store the resulting sessions.
///
/// Each file is handled by its own task with its own recorder and filter; at most
/// `workers` run at once. Closed sessions are sent to a single writer that owns
/// the store. A file that cannot be read is reported in the summary and does not
/// stop the others.
pub async fn execute_replay(options: ReplayOptions) -> Result<ReplaySummary> {
    let ReplayOptions {
        capture_files,
        db_path,
        workers,
        policy,
        show_progress_bars,
    } = options;

    if capture_files.is_empty() {
        return Err(CoreError::Replay("no capture files provided".to_string()));
    }
    let workers = workers.max(1);

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(capture_files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message("replaying captures");
        Some(pb)
    } else {
        None
    };

    // Single writer: the store is only ever touched from this task
    let store = CaptureStore::open(&db_path)?;
    let (tx, mut rx) = mpsc::channel::<ClosedSession>(workers * 4);
    let writer = tokio::task::spawn_blocking(move || -> Result<Vec<SessionOutcome>> {
        let mut store = store;
        let mut outcomes = Vec::new();
        while let Some(closed) = rx.blocking_recv() {
            match store.save_closed_session(&closed) {
                Ok(()) => outcomes.push(SessionOutcome {
                    session_id: closed.session.session_id.clone(),
                    session_start_url: closed.session.session_start_url.clone(),
                    interactions: closed.interactions.len(),
                    network_events: closed.network_events.len(),
                    partial: closed.partial,
                }),
                // Already stored, e.g. the same capture replayed twice
                Err(CoreError::Schema(message)) => warn!(%message, "session skipped"),
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    });

    let semaphore = Arc::new(Semaphore::new(workers));
    let policy = Arc::new(policy);
    let mut tasks = Vec::new();

    for path in capture_files {
        let semaphore = semaphore.clone();
        let policy = policy.clone();
        let tx = tx.clone();
        let pb = progress_bar.clone();

        tasks.push(tokio::spawn(async move {
            let result = replay_file(&path, &semaphore, &policy, &tx).await;
            if let Some(pb) = pb {
                pb.inc(1);
            }
            (path, result)
        }));
    }
    // Writer stops once every worker has dropped its sender
    drop(tx);

    let mut summary = ReplaySummary::default();
    for task in tasks {
        let (path, result) = task.await?;
        match result {
            Ok(sessions) => {
                debug!(file = %path.display(), sessions, "capture replayed");
                summary.files_processed += 1;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "capture file failed");
                summary.failed_files.push((path, e.to_string()));
            }
        }
    }

    summary.sessions = writer.await??;
    if let Some(pb) = progress_bar {
        pb.finish_with_message("done");
    }

    info!(
        files = summary.files_processed,
        sessions = summary.sessions.len(),
        partial = summary.partial_sessions(),
        "replay complete"
    );

    Ok(summary)
}

async fn replay_file(
    path: &Path,
    semaphore: &Semaphore,
    policy: &FilterPolicy,
    tx: &mpsc::Sender<ClosedSession>,
) -> Result<usize> {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|e| CoreError::Replay(e.to_string()))?;
    let content = tokio::fs::read(path).await?;
    let sessions = replay_capture(&content[..], policy, &path.display().to_string())?;
    let count = sessions.len();
    for session in sessions {
        tx.send(session)
            .await
            .map_err(|_| CoreError::Replay("capture store writer stopped".to_string()))?;
    }
    Ok(count)
}

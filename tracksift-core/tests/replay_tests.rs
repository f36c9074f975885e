// Tests for capture replay and the concurrent replay pipeline

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracksift_capture::{FilterPolicy, RawRequestRecord, RawResponse};
use tracksift_core::error::CoreError;
use tracksift_core::event::{EventType, InteractionEvent};
use tracksift_core::replay::{
    CaptureRecord, ReplayOptions, ReplaySource, execute_replay, replay_capture,
};
use tracksift_core::session::RequestSource;
use tracksift_core::store::CaptureStore;

fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 14, 9, 30, 0).unwrap() + Duration::seconds(offset_secs)
}

fn start(id: &str, url: &str, at: i64) -> CaptureRecord {
    CaptureRecord::SessionStart {
        session_id: Some(id.to_string()),
        start_url: url.to_string(),
        timestamp: ts(at),
    }
}

fn tracker_post(at: i64) -> CaptureRecord {
    CaptureRecord::Request(
        RawRequestRecord::new("POST", "https://collect.tracker.example/e", ts(at))
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("uid=42&event=view")
            .with_response(RawResponse::new(204).with_reason("No Content")),
    )
}

fn checkpoint(action: &str, at: i64) -> CaptureRecord {
    CaptureRecord::Checkpoint {
        page_url: "https://news.example/".to_string(),
        action: action.to_string(),
        timestamp: ts(at),
    }
}

fn to_lines(records: &[CaptureRecord]) -> String {
    records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

fn complete_capture(id: &str) -> String {
    to_lines(&[
        start(id, "https://news.example/", 0),
        CaptureRecord::Interaction(
            InteractionEvent::new(EventType::PageVisit, ts(0)).at_url("https://news.example/"),
        ),
        tracker_post(1),
        checkpoint("initial_page_load", 2),
        CaptureRecord::Interaction(InteractionEvent::new(EventType::Click, ts(3)).at_position(5.0, 5.0)),
        tracker_post(4),
        checkpoint("after_click_1", 5),
        CaptureRecord::SessionEnd { timestamp: ts(6) },
    ])
}

fn write_capture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Capture Format Tests
// ============================================================================

#[test]
fn test_hand_written_capture_lines_parse() {
    let capture = r#"
{"type":"session_start","start_url":"https://news.example/","timestamp":"2025-05-14T09:30:00Z"}
{"type":"interaction","timestamp":"2025-05-14T09:30:01Z","event_type":"click","element":{"state":"present","tag":"button","text":"Accept"}}
{"type":"request","url":"https://t.example/pixel?uid=1","method":"GET","timestamp":"2025-05-14T09:30:01Z","response":{"status":200,"headers":{"content-type":"application/javascript"}}}
{"type":"checkpoint","page_url":"https://news.example/","action":"after_cookie_dismiss","timestamp":"2025-05-14T09:30:02Z"}
{"type":"session_end","timestamp":"2025-05-14T09:30:03Z"}
"#;

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "inline").unwrap();

    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert!(!session.partial);
    assert!(!session.session.session_id.is_empty());
    assert_eq!(session.interactions[0].element.as_ref().unwrap().tag(), "button");
    assert_eq!(session.network_events.len(), 1);
    assert_eq!(session.network_events[0].associated_action, "after_cookie_dismiss");
    assert_eq!(session.network_events[0].response_reason, "N/A");
}

// ============================================================================
// Replay Semantics Tests
// ============================================================================

#[test]
fn test_complete_session_replay() {
    let capture = complete_capture("s1");

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "s1.jsonl").unwrap();

    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.session.session_id, "s1");
    assert!(!session.partial);
    assert_eq!(session.ended_at, ts(6));
    assert_eq!(session.interactions.len(), 2);
    let actions: Vec<&str> = session
        .network_events
        .iter()
        .map(|e| e.associated_action.as_str())
        .collect();
    assert_eq!(actions, vec!["initial_page_load", "after_click_1"]);
    assert_eq!(session.network_events[0].request_body_snippet, "uid=42&event=view");
}

#[test]
fn test_missing_session_end_closes_as_partial() {
    let capture = to_lines(&[
        start("s1", "https://news.example/", 0),
        CaptureRecord::Interaction(InteractionEvent::new(EventType::PageVisit, ts(7))),
    ]);

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "cut.jsonl").unwrap();

    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].partial);
    assert_eq!(sessions[0].ended_at, ts(7));
    let last = sessions[0].interactions.last().unwrap();
    assert_eq!(last.event_type, EventType::Error);
    assert_eq!(last.details.as_deref(), Some("capture ended before the session was closed"));
}

#[test]
fn test_new_session_interrupts_open_one() {
    let capture = to_lines(&[
        start("s1", "https://a.example/", 0),
        start("s2", "https://b.example/", 10),
        CaptureRecord::SessionEnd { timestamp: ts(20) },
    ]);

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "two.jsonl").unwrap();

    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].partial);
    assert_eq!(sessions[0].ended_at, ts(10));
    assert!(!sessions[1].partial);
}

#[test]
fn test_session_abort_keeps_reason() {
    let capture = to_lines(&[
        start("s1", "https://news.example/", 0),
        tracker_post(1),
        checkpoint("initial_page_load", 2),
        CaptureRecord::SessionAbort {
            reason: "navigation timeout".to_string(),
            timestamp: ts(3),
        },
    ]);

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "abort.jsonl").unwrap();

    assert!(sessions[0].partial);
    assert_eq!(sessions[0].network_events.len(), 1);
    assert_eq!(
        sessions[0].interactions.last().unwrap().details.as_deref(),
        Some("navigation timeout")
    );
}

#[test]
fn test_requests_after_last_checkpoint_are_dropped() {
    let capture = to_lines(&[
        start("s1", "https://news.example/", 0),
        tracker_post(1),
        CaptureRecord::SessionEnd { timestamp: ts(2) },
    ]);

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "late.jsonl").unwrap();

    assert!(sessions[0].network_events.is_empty());
}

#[test]
fn test_malformed_lines_are_skipped() {
    let capture = format!(
        "{}\nnot json at all\n{{\"type\":\"teleport\"}}\n{}",
        serde_json::to_string(&start("s1", "https://news.example/", 0)).unwrap(),
        serde_json::to_string(&CaptureRecord::SessionEnd { timestamp: ts(1) }).unwrap()
    );

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "bad.jsonl").unwrap();

    assert_eq!(sessions.len(), 1);
    assert!(!sessions[0].partial);
}

#[test]
fn test_undecodable_lines_are_skipped() {
    let mut capture = serde_json::to_string(&start("s1", "https://news.example/", 0))
        .unwrap()
        .into_bytes();
    capture.extend_from_slice(b"\n{\"type\":\"interaction\",\"note\":\"\xFF\xFE\"}\n");
    capture.extend_from_slice(
        serde_json::to_string(&CaptureRecord::SessionEnd { timestamp: ts(1) })
            .unwrap()
            .as_bytes(),
    );

    let sessions = replay_capture(&capture[..], &FilterPolicy::default(), "bytes.jsonl").unwrap();

    assert_eq!(sessions.len(), 1);
    assert!(!sessions[0].partial);
}

#[test]
fn test_replay_source_holds_requests_until_drained() {
    let mut source = ReplaySource::new();
    source.observe(RawRequestRecord::new("GET", "https://t.example/p", ts(0)));
    source.observe(RawRequestRecord::new("POST", "https://t.example/e", ts(1)));
    assert_eq!(source.pending(), 2);

    let drained = source.drain_requests();

    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].method, "GET");
    assert_eq!(source.pending(), 0);
}

#[test]
fn test_events_outside_a_session_are_ignored() {
    let capture = to_lines(&[
        CaptureRecord::Interaction(InteractionEvent::new(EventType::Click, ts(0))),
        tracker_post(1),
        checkpoint("initial_page_load", 2),
    ]);

    let sessions = replay_capture(capture.as_bytes(), &FilterPolicy::default(), "stray.jsonl").unwrap();
    assert!(sessions.is_empty());
}

// ============================================================================
// Replay Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_execute_replay_stores_every_session() {
    let temp_dir = TempDir::new().unwrap();
    let first = write_capture(&temp_dir, "first.jsonl", &complete_capture("s1"));
    let second = write_capture(&temp_dir, "second.jsonl", &complete_capture("s2"));
    let db_path = temp_dir.path().join("capture.db");

    let summary = execute_replay(ReplayOptions {
        capture_files: vec![first, second],
        db_path: db_path.clone(),
        workers: 2,
        policy: FilterPolicy::default(),
        show_progress_bars: false,
    })
    .await
    .unwrap();

    assert_eq!(summary.files_processed, 2);
    assert!(summary.failed_files.is_empty());
    assert_eq!(summary.sessions.len(), 2);
    assert_eq!(summary.network_events(), 4);
    assert_eq!(summary.partial_sessions(), 0);

    let store = CaptureStore::open(&db_path).unwrap();
    assert_eq!(store.load_closed_sessions().unwrap().len(), 2);
}

#[tokio::test]
async fn test_execute_replay_reports_unreadable_files() {
    let temp_dir = TempDir::new().unwrap();
    let good = write_capture(&temp_dir, "good.jsonl", &complete_capture("s1"));
    let missing = temp_dir.path().join("missing.jsonl");

    let summary = execute_replay(ReplayOptions {
        capture_files: vec![good, missing.clone()],
        db_path: temp_dir.path().join("capture.db"),
        workers: 1,
        policy: FilterPolicy::default(),
        show_progress_bars: false,
    })
    .await
    .unwrap();

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.failed_files.len(), 1);
    assert_eq!(summary.failed_files[0].0, missing);
    assert_eq!(summary.sessions.len(), 1);
}

#[tokio::test]
async fn test_execute_replay_skips_already_stored_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let a = write_capture(&temp_dir, "a.jsonl", &complete_capture("same"));
    let b = write_capture(&temp_dir, "b.jsonl", &complete_capture("same"));
    let db_path = temp_dir.path().join("capture.db");

    let summary = execute_replay(ReplayOptions {
        capture_files: vec![a, b],
        db_path: db_path.clone(),
        workers: 2,
        policy: FilterPolicy::default(),
        show_progress_bars: false,
    })
    .await
    .unwrap();

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.sessions.len(), 1);
    let store = CaptureStore::open(&db_path).unwrap();
    assert_eq!(store.session_count().unwrap(), 1);
}

#[tokio::test]
async fn test_execute_replay_survives_truncated_multibyte_tail() {
    let temp_dir = TempDir::new().unwrap();
    let mut content = complete_capture("s1").into_bytes();
    content.push(b'\n');
    content.extend_from_slice(
        serde_json::to_string(&start("s2", "https://news.example/", 10))
            .unwrap()
            .as_bytes(),
    );
    // Crawler died halfway through writing "café"
    content.extend_from_slice(
        b"\n{\"type\":\"interaction\",\"timestamp\":\"2025-05-14T09:30:11Z\",\"event_type\":\"page_visit\",\"url\":\"https://news.example/caf\xC3",
    );
    let path = temp_dir.path().join("crash.jsonl");
    fs::write(&path, &content).unwrap();

    let summary = execute_replay(ReplayOptions {
        capture_files: vec![path],
        db_path: temp_dir.path().join("capture.db"),
        workers: 1,
        policy: FilterPolicy::default(),
        show_progress_bars: false,
    })
    .await
    .unwrap();

    assert!(summary.failed_files.is_empty());
    assert_eq!(summary.sessions.len(), 2);
    assert_eq!(summary.partial_sessions(), 1);
}

#[tokio::test]
async fn test_execute_replay_without_files_is_an_error() {
    let temp_dir = TempDir::new().unwrap();

    let result = execute_replay(ReplayOptions {
        capture_files: vec![],
        db_path: temp_dir.path().join("capture.db"),
        workers: 4,
        policy: FilterPolicy::default(),
        show_progress_bars: false,
    })
    .await;

    assert!(matches!(result, Err(CoreError::Replay(_))));
}

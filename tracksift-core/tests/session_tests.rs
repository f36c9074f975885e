// Tests for the session event log and the session recorder

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracksift_capture::{FilterPolicy, RawRequestRecord, RawResponse};
use tracksift_core::event::{EventType, InteractionEvent};
use tracksift_core::session::{RequestSource, Session, SessionLog, SessionRecorder};

fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 14, 9, 30, 0).unwrap() + Duration::seconds(offset_secs)
}

fn tracker_post() -> RawRequestRecord {
    RawRequestRecord::new("POST", "https://collect.tracker.example/v1/event", ts(1))
        .with_header("Content-Type", "application/json")
        .with_body("{\"event\":\"view\"}")
        .with_response(RawResponse::new(200).with_reason("OK").with_content_type("application/json"))
}

fn first_party_get() -> RawRequestRecord {
    RawRequestRecord::new("GET", "https://api.news.example/feed?utm_source=x", ts(1))
        .with_response(RawResponse::new(200).with_content_type("application/json"))
}

fn stylesheet() -> RawRequestRecord {
    RawRequestRecord::new("GET", "https://cdn.other.example/site.css", ts(1))
        .with_response(RawResponse::new(200).with_content_type("text/css"))
}

// ============================================================================
// Session Event Log Tests
// ============================================================================

#[test]
fn test_session_new_assigns_unique_ids() {
    let a = Session::new("https://news.example/");
    let b = Session::new("https://news.example/");

    assert_ne!(a.session_id, b.session_id);
    assert_eq!(a.session_start_url, "https://news.example/");
}

#[test]
fn test_log_preserves_insertion_order() {
    let mut log = SessionLog::new(Session::with_id("s1", "https://news.example/", ts(0)));

    log.append_interaction(InteractionEvent::new(EventType::PageVisit, ts(0)));
    log.append_interaction(InteractionEvent::new(EventType::MouseMove, ts(2)));
    log.append_interaction(InteractionEvent::new(EventType::Click, ts(1)));

    let types: Vec<EventType> = log.interactions().iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::PageVisit, EventType::MouseMove, EventType::Click]);
}

#[test]
fn test_log_keeps_duplicates() {
    let mut log = SessionLog::new(Session::with_id("s1", "https://news.example/", ts(0)));
    let event = InteractionEvent::new(EventType::Click, ts(3)).at_position(10.0, 20.0);

    log.append_interaction(event.clone());
    log.append_interaction(event);

    assert_eq!(log.interactions().len(), 2);
}

#[test]
fn test_close_hands_back_both_sequences() {
    let mut log = SessionLog::new(Session::with_id("s1", "https://news.example/", ts(0)));
    log.append_interaction(InteractionEvent::new(EventType::PageVisit, ts(0)));

    let (interactions, network) = log.close();
    assert_eq!(interactions.len(), 1);
    assert!(network.is_empty());
}

// ============================================================================
// Request Source Tests
// ============================================================================

#[test]
fn test_vec_source_drains_once() {
    let mut source = vec![tracker_post(), stylesheet()];

    assert_eq!(source.drain_requests().len(), 2);
    assert!(source.drain_requests().is_empty());
}

// ============================================================================
// Session Recorder Tests
// ============================================================================

#[test]
fn test_capture_network_keeps_only_retained_requests() {
    let mut recorder = SessionRecorder::resume(
        Session::with_id("s1", "https://www.news.example/", ts(0)),
        FilterPolicy::default(),
    );
    let mut source = vec![tracker_post(), first_party_get(), stylesheet()];

    let retained =
        recorder.capture_network_at(&mut source, "https://www.news.example/", "initial_page_load", ts(2));

    assert_eq!(retained, 1);
    let events = recorder.log().network_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_url, "https://collect.tracker.example/v1/event");
    assert_eq!(events[0].associated_action, "initial_page_load");
    assert_eq!(events[0].request_body_snippet, "{\"event\":\"view\"}");
    assert_eq!(events[0].capture_timestamp, ts(2));
}

#[test]
fn test_capture_network_only_sees_new_requests() {
    let mut recorder = SessionRecorder::start("https://news.example/", FilterPolicy::default());
    let mut source = vec![tracker_post()];

    assert_eq!(recorder.capture_network(&mut source, "https://news.example/", "initial_page_load"), 1);
    assert_eq!(recorder.capture_network(&mut source, "https://news.example/", "after_click_1"), 0);
    assert_eq!(recorder.log().network_events().len(), 1);
}

#[test]
fn test_record_interaction_normalizes_element_text() {
    let mut recorder = SessionRecorder::start("https://news.example/", FilterPolicy::default());
    let long_text = format!("  Accept\n{}", "x".repeat(300));

    recorder.record_interaction(
        InteractionEvent::new(EventType::Click, ts(1)).with_element("button", Some(&long_text)),
    );

    let element = recorder.log().interactions()[0].element.clone().unwrap();
    let text = element.text().unwrap();
    assert!(text.starts_with("Accept x"));
    assert_eq!(text.chars().count(), 100);
}

#[test]
fn test_finish_closes_normally() {
    let mut recorder = SessionRecorder::resume(
        Session::with_id("s1", "https://news.example/", ts(0)),
        FilterPolicy::default(),
    );
    recorder.record_interaction(InteractionEvent::new(EventType::PageVisit, ts(0)));

    let closed = recorder.finish_at(ts(30));

    assert!(!closed.partial);
    assert_eq!(closed.ended_at, ts(30));
    assert_eq!(closed.session.session_id, "s1");
    assert_eq!(closed.interactions.len(), 1);
}

#[test]
fn test_abort_marks_partial_and_records_reason() {
    let mut recorder = SessionRecorder::resume(
        Session::with_id("s1", "https://news.example/", ts(0)),
        FilterPolicy::default(),
    );
    recorder.record_interaction(InteractionEvent::new(EventType::PageVisit, ts(0)));
    let mut source = vec![tracker_post()];
    recorder.capture_network_at(&mut source, "https://news.example/", "initial_page_load", ts(1));

    let closed = recorder.abort_at("page load timeout", ts(5));

    assert!(closed.partial);
    assert_eq!(closed.network_events.len(), 1);
    let last = closed.interactions.last().unwrap();
    assert_eq!(last.event_type, EventType::Error);
    assert_eq!(last.details.as_deref(), Some("page load timeout"));
}

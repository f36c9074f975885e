// Raw per-event behavior and network logs in CSV form

use crate::error::Result;
use crate::event::InteractionEvent;
use crate::features::{SESSION_ID_COLUMN, START_URL_COLUMN};
use crate::session::ClosedSession;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracksift_capture::{NOT_AVAILABLE, NetworkEvent};

pub const BEHAVIOR_LOG_FILE: &str = "user_behavior_log.csv";
pub const NETWORK_LOG_FILE: &str = "network_traffic_log.csv";

pub const BEHAVIOR_LOG_HEADER: [&str; 9] = [
    "timestamp",
    "url",
    "event_type",
    "pos_x",
    "pos_y",
    "element_tag",
    "element_text",
    "details",
    SESSION_ID_COLUMN,
];

pub const NETWORK_LOG_HEADER: [&str; 11] = [
    "capture_timestamp",
    "page_url",
    "associated_action",
    "request_method",
    "request_url",
    "response_status",
    "response_reason",
    "request_referer",
    "response_content_type",
    "request_body_snippet",
    START_URL_COLUMN,
];

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn or_placeholder(value: Option<&str>) -> String {
    value.unwrap_or(NOT_AVAILABLE).to_string()
}

fn behavior_record(event: &InteractionEvent, session_id: &str) -> [String; 9] {
    let (tag, text) = match &event.element {
        Some(element) => (element.tag().to_string(), or_placeholder(element.text())),
        None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
    };
    [
        format_timestamp(&event.timestamp),
        or_placeholder(event.url.as_deref()),
        event.event_type.as_str().to_string(),
        event.pos_x.map_or_else(|| NOT_AVAILABLE.to_string(), |x| x.to_string()),
        event.pos_y.map_or_else(|| NOT_AVAILABLE.to_string(), |y| y.to_string()),
        tag,
        text,
        or_placeholder(event.details.as_deref()),
        session_id.to_string(),
    ]
}

fn network_record(event: &NetworkEvent, start_url: &str) -> [String; 11] {
    [
        format_timestamp(&event.capture_timestamp),
        event.page_url.clone(),
        event.associated_action.clone(),
        event.request_method.clone(),
        event.request_url.clone(),
        event.response_status.to_string(),
        event.response_reason.clone(),
        event.request_referer.clone(),
        event.response_content_type.clone(),
        event.request_body_snippet.clone(),
        start_url.to_string(),
    ]
}

/// Write every interaction of every session, one row per event. Returns the row count.
pub fn write_behavior_log<W: Write>(writer: W, sessions: &[ClosedSession]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(BEHAVIOR_LOG_HEADER)?;
    let mut rows = 0;
    for session in sessions {
        for event in &session.interactions {
            csv_writer.write_record(behavior_record(event, &session.session.session_id))?;
            rows += 1;
        }
    }
    csv_writer.flush()?;
    Ok(rows)
}

pub fn write_network_log<W: Write>(writer: W, sessions: &[ClosedSession]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(NETWORK_LOG_HEADER)?;
    let mut rows = 0;
    for session in sessions {
        for event in &session.network_events {
            csv_writer.write_record(network_record(event, &session.session.session_start_url))?;
            rows += 1;
        }
    }
    csv_writer.flush()?;
    Ok(rows)
}

/// Write both logs into `dir` under their standard file names.
pub fn write_logs(dir: &Path, sessions: &[ClosedSession]) -> Result<(usize, usize)> {
    std::fs::create_dir_all(dir)?;
    let behavior = write_behavior_log(File::create(dir.join(BEHAVIOR_LOG_FILE))?, sessions)?;
    let network = write_network_log(File::create(dir.join(NETWORK_LOG_FILE))?, sessions)?;
    Ok((behavior, network))
}

// Session feature aggregation into fixed-schema numeric rows

use crate::error::Result;
use crate::event::{EventType, InteractionEvent};
use crate::session::ClosedSession;
use crate::table::FeatureTable;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracksift_capture::{FilterPolicy, NOT_AVAILABLE, NetworkEvent, main_domain};

pub const SESSION_ID_COLUMN: &str = "session_id_group";
pub const START_URL_COLUMN: &str = "session_start_url";

pub const BEHAVIOR_FEATURES_FILE: &str = "session_behavior_features.csv";
pub const NETWORK_FEATURES_FILE: &str = "session_network_features.csv";

/// A feature row with a static column layout.
///
/// Every row of a given kind has the same columns whether or not the underlying
/// events occurred; absent events count as zero.
pub trait FeatureRow {
    const ID_COLUMNS: &'static [&'static str];
    const FEATURE_COLUMNS: &'static [&'static str];

    /// Values in `FEATURE_COLUMNS` order.
    fn values(&self) -> Vec<f64>;

    fn empty_table() -> FeatureTable {
        FeatureTable::new(
            Self::ID_COLUMNS.iter().map(|c| c.to_string()).collect(),
            Self::FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorFeatures {
    pub total_events: usize,
    pub page_visit_count: usize,
    pub mouse_move_count: usize,
    pub mouse_move_to_element_count: usize,
    pub click_count: usize,
    pub cookie_dismiss_attempt_count: usize,
    pub cookie_dismissed_count: usize,
    pub skip_interaction_count: usize,
    pub error_count: usize,
    pub distinct_urls: usize,
    pub session_duration_secs: f64,
    pub mean_event_gap_secs: f64,
    pub max_event_gap_secs: f64,
    /// Euclidean length of the path traced by `mouse_move` positions.
    pub mouse_path_length: f64,
    pub cookie_banner_attempted: bool,
    pub cookie_banner_dismissed: bool,
    pub partial_session: bool,
}

impl FeatureRow for BehaviorFeatures {
    const ID_COLUMNS: &'static [&'static str] = &[SESSION_ID_COLUMN, START_URL_COLUMN];
    const FEATURE_COLUMNS: &'static [&'static str] = &[
        "beh_total_events",
        "beh_page_visit_count",
        "beh_mouse_move_count",
        "beh_mouse_move_to_element_count",
        "beh_click_count",
        "beh_cookie_dismiss_attempt_count",
        "beh_cookie_dismissed_count",
        "beh_skip_interaction_count",
        "beh_error_count",
        "beh_distinct_urls",
        "beh_session_duration_secs",
        "beh_mean_event_gap_secs",
        "beh_max_event_gap_secs",
        "beh_mouse_path_length",
        "beh_cookie_banner_attempted",
        "beh_cookie_banner_dismissed",
        "beh_partial_session",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.total_events as f64,
            self.page_visit_count as f64,
            self.mouse_move_count as f64,
            self.mouse_move_to_element_count as f64,
            self.click_count as f64,
            self.cookie_dismiss_attempt_count as f64,
            self.cookie_dismissed_count as f64,
            self.skip_interaction_count as f64,
            self.error_count as f64,
            self.distinct_urls as f64,
            self.session_duration_secs,
            self.mean_event_gap_secs,
            self.max_event_gap_secs,
            self.mouse_path_length,
            flag(self.cookie_banner_attempted),
            flag(self.cookie_banner_dismissed),
            flag(self.partial_session),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkFeatures {
    pub total_requests_logged: usize,
    pub get_count: usize,
    pub post_count: usize,
    pub put_count: usize,
    pub delete_count: usize,
    pub other_method_count: usize,
    pub status_2xx: usize,
    pub status_3xx: usize,
    pub status_4xx: usize,
    pub status_5xx: usize,
    pub status_other: usize,
    pub status_204_count: usize,
    pub distinct_third_party_domains: usize,
    pub distinct_content_types: usize,
    pub body_snippet_count: usize,
    pub tracking_param_url_count: usize,
    pub long_url_count: usize,
    pub mean_url_length: f64,
    pub capture_span_secs: f64,
    pub distinct_actions: usize,
    pub initial_load_count: usize,
    pub after_cookie_dismiss_count: usize,
    pub after_click_count: usize,
}

impl FeatureRow for NetworkFeatures {
    const ID_COLUMNS: &'static [&'static str] = &[START_URL_COLUMN];
    const FEATURE_COLUMNS: &'static [&'static str] = &[
        "net_total_requests_logged",
        "net_get_count",
        "net_post_count",
        "net_put_count",
        "net_delete_count",
        "net_other_method_count",
        "net_status_2xx",
        "net_status_3xx",
        "net_status_4xx",
        "net_status_5xx",
        "net_status_other",
        "net_status_204_count",
        "net_distinct_third_party_domains",
        "net_distinct_content_types",
        "net_body_snippet_count",
        "net_tracking_param_url_count",
        "net_long_url_count",
        "net_mean_url_length",
        "net_capture_span_secs",
        "net_distinct_actions",
        "net_initial_load_count",
        "net_after_cookie_dismiss_count",
        "net_after_click_count",
    ];

    fn values(&self) -> Vec<f64> {
        vec![
            self.total_requests_logged as f64,
            self.get_count as f64,
            self.post_count as f64,
            self.put_count as f64,
            self.delete_count as f64,
            self.other_method_count as f64,
            self.status_2xx as f64,
            self.status_3xx as f64,
            self.status_4xx as f64,
            self.status_5xx as f64,
            self.status_other as f64,
            self.status_204_count as f64,
            self.distinct_third_party_domains as f64,
            self.distinct_content_types as f64,
            self.body_snippet_count as f64,
            self.tracking_param_url_count as f64,
            self.long_url_count as f64,
            self.mean_url_length,
            self.capture_span_secs,
            self.distinct_actions as f64,
            self.initial_load_count as f64,
            self.after_cookie_dismiss_count as f64,
            self.after_click_count as f64,
        ]
    }
}

/// Both feature rows of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFeatures {
    pub session_id: String,
    pub session_start_url: String,
    pub behavior: BehaviorFeatures,
    pub network: NetworkFeatures,
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

fn span_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}

/// Reduce one session's events to its behavior and network rows.
///
/// Total: empty inputs give rows of zeros. `partial_session` is left unset;
/// [`aggregate_session`] fills it from the closed session.
pub fn aggregate(
    session_id: &str,
    session_start_url: &str,
    interactions: &[InteractionEvent],
    network_events: &[NetworkEvent],
    policy: &FilterPolicy,
) -> SessionFeatures {
    SessionFeatures {
        session_id: session_id.to_string(),
        session_start_url: session_start_url.to_string(),
        behavior: aggregate_behavior(interactions),
        network: aggregate_network(network_events, policy),
    }
}

pub fn aggregate_session(session: &ClosedSession, policy: &FilterPolicy) -> SessionFeatures {
    let mut features = aggregate(
        &session.session.session_id,
        &session.session.session_start_url,
        &session.interactions,
        &session.network_events,
        policy,
    );
    features.behavior.partial_session = session.partial;
    features
}

pub fn aggregate_behavior(interactions: &[InteractionEvent]) -> BehaviorFeatures {
    let mut features = BehaviorFeatures {
        total_events: interactions.len(),
        ..BehaviorFeatures::default()
    };

    let mut urls = HashSet::new();
    for event in interactions {
        match event.event_type {
            EventType::PageVisit => features.page_visit_count += 1,
            EventType::MouseMove => features.mouse_move_count += 1,
            EventType::MouseMoveToElement => features.mouse_move_to_element_count += 1,
            EventType::Click => features.click_count += 1,
            EventType::AttemptCookieBannerDismiss => features.cookie_dismiss_attempt_count += 1,
            EventType::CookieBannerDismissed => features.cookie_dismissed_count += 1,
            EventType::SkipInteraction => features.skip_interaction_count += 1,
            EventType::Error => features.error_count += 1,
        }
        if let Some(url) = event.url.as_deref()
            && url != NOT_AVAILABLE
        {
            urls.insert(url);
        }
    }
    features.distinct_urls = urls.len();
    features.cookie_banner_attempted = features.cookie_dismiss_attempt_count > 0;
    features.cookie_banner_dismissed = features.cookie_dismissed_count > 0;

    if let (Some(first), Some(last)) = (
        interactions.iter().map(|e| e.timestamp).min(),
        interactions.iter().map(|e| e.timestamp).max(),
    ) {
        features.session_duration_secs = span_secs(first, last);
    }

    // Gaps follow observation order
    let gaps: Vec<f64> = interactions
        .windows(2)
        .map(|pair| span_secs(pair[0].timestamp, pair[1].timestamp))
        .collect();
    if !gaps.is_empty() {
        features.mean_event_gap_secs = gaps.iter().sum::<f64>() / gaps.len() as f64;
        features.max_event_gap_secs = gaps.iter().copied().fold(0.0, f64::max);
    }

    let positions: Vec<(f64, f64)> = interactions
        .iter()
        .filter(|e| e.event_type == EventType::MouseMove)
        .filter_map(|e| e.position())
        .collect();
    features.mouse_path_length = positions
        .windows(2)
        .map(|pair| {
            let (dx, dy) = (pair[1].0 - pair[0].0, pair[1].1 - pair[0].1);
            (dx * dx + dy * dy).sqrt()
        })
        .sum();

    features
}

pub fn aggregate_network(events: &[NetworkEvent], policy: &FilterPolicy) -> NetworkFeatures {
    let mut features = NetworkFeatures {
        total_requests_logged: events.len(),
        ..NetworkFeatures::default()
    };

    let mut domains = HashSet::new();
    let mut content_types = HashSet::new();
    let mut actions = HashSet::new();
    let mut url_length_total = 0usize;

    for event in events {
        match event.request_method.to_ascii_uppercase().as_str() {
            "GET" => features.get_count += 1,
            "POST" => features.post_count += 1,
            "PUT" => features.put_count += 1,
            "DELETE" => features.delete_count += 1,
            _ => features.other_method_count += 1,
        }
        match event.response_status {
            200..=299 => features.status_2xx += 1,
            300..=399 => features.status_3xx += 1,
            400..=499 => features.status_4xx += 1,
            500..=599 => features.status_5xx += 1,
            _ => features.status_other += 1,
        }
        if event.response_status == 204 {
            features.status_204_count += 1;
        }

        if let Some(domain) = main_domain(&event.request_url) {
            domains.insert(domain);
        }
        if !event.response_content_type.is_empty() {
            content_types.insert(event.response_content_type.as_str());
        }
        if event.request_body_snippet != NOT_AVAILABLE {
            features.body_snippet_count += 1;
        }

        let url_lower = event.request_url.to_lowercase();
        if policy
            .tracking_param_markers
            .iter()
            .any(|marker| url_lower.contains(marker.as_str()))
        {
            features.tracking_param_url_count += 1;
        }
        let url_chars = event.request_url.chars().count();
        url_length_total += url_chars;
        if event.request_url.contains('?') && url_chars > policy.long_url_threshold {
            features.long_url_count += 1;
        }

        let action = event.associated_action.as_str();
        actions.insert(action);
        if action == "initial_page_load" {
            features.initial_load_count += 1;
        } else if action == "after_cookie_dismiss" {
            features.after_cookie_dismiss_count += 1;
        } else if action.starts_with("after_click_") {
            features.after_click_count += 1;
        }
    }

    features.distinct_third_party_domains = domains.len();
    features.distinct_content_types = content_types.len();
    features.distinct_actions = actions.len();
    if !events.is_empty() {
        features.mean_url_length = url_length_total as f64 / events.len() as f64;
    }
    if let (Some(first), Some(last)) = (
        events.iter().map(|e| e.capture_timestamp).min(),
        events.iter().map(|e| e.capture_timestamp).max(),
    ) {
        features.capture_span_secs = span_secs(first, last);
    }

    features
}

/// One behavior row per session, keyed by session id and start URL.
pub fn behavior_table(sessions: &[ClosedSession]) -> Result<FeatureTable> {
    let mut table = BehaviorFeatures::empty_table();
    for session in sessions {
        let mut features = aggregate_behavior(&session.interactions);
        features.partial_session = session.partial;
        table.push_row(
            vec![
                session.session.session_id.clone(),
                session.session.session_start_url.clone(),
            ],
            features.values().into_iter().map(Some).collect(),
        )?;
    }
    Ok(table)
}

/// One network row per distinct start URL.
///
/// Sessions sharing a start URL have their network events pooled before
/// aggregation, so the start URL is unique in the result. Rows follow the
/// order in which each URL first appears.
pub fn network_table(sessions: &[ClosedSession], policy: &FilterPolicy) -> Result<FeatureTable> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<NetworkEvent>> = HashMap::new();
    for session in sessions {
        let url = session.session.session_start_url.as_str();
        let events = grouped.entry(url).or_insert_with(|| {
            order.push(url);
            Vec::new()
        });
        events.extend(session.network_events.iter().cloned());
    }

    let mut table = NetworkFeatures::empty_table();
    for url in order {
        let events = grouped.get(url).map(Vec::as_slice).unwrap_or_default();
        let features = aggregate_network(events, policy);
        table.push_row(
            vec![url.to_string()],
            features.values().into_iter().map(Some).collect(),
        )?;
    }
    Ok(table)
}

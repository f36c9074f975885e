// Per-session event log and the recorder that drives it

use crate::event::{EventType, InteractionEvent};
use chrono::{DateTime, Utc};
use tracing::debug;
use tracksift_capture::{CaptureContext, FilterPolicy, NetworkEvent, RawRequestRecord, RequestFilter};

/// One continuous browsing episode anchored to a starting URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub session_start_url: String,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_start_url: &str) -> Self {
        Self::with_id(&uuid::Uuid::new_v4().to_string(), session_start_url, Utc::now())
    }

    pub fn with_id(session_id: &str, session_start_url: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            session_start_url: session_start_url.to_string(),
            started_at,
        }
    }
}

/// Append-only interaction and network sequences of a single session.
///
/// Each sequence keeps insertion order; nothing is deduplicated.
#[derive(Debug)]
pub struct SessionLog {
    session: Session,
    interactions: Vec<InteractionEvent>,
    network_events: Vec<NetworkEvent>,
}

impl SessionLog {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            interactions: Vec::new(),
            network_events: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn append_interaction(&mut self, event: InteractionEvent) {
        self.interactions.push(event);
    }

    pub fn append_network(&mut self, event: NetworkEvent) {
        self.network_events.push(event);
    }

    pub fn interactions(&self) -> &[InteractionEvent] {
        &self.interactions
    }

    pub fn network_events(&self) -> &[NetworkEvent] {
        &self.network_events
    }

    /// Consume the log, handing back both sequences for aggregation.
    pub fn close(self) -> (Vec<InteractionEvent>, Vec<NetworkEvent>) {
        (self.interactions, self.network_events)
    }
}

/// A session whose log has been closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub session: Session,
    pub ended_at: DateTime<Utc>,
    pub interactions: Vec<InteractionEvent>,
    pub network_events: Vec<NetworkEvent>,
    /// Set when the session was cut short; an `error` interaction records why.
    pub partial: bool,
}

/// Source of raw requests observed by the browser instrumentation.
pub trait RequestSource {
    /// Requests observed since the previous drain.
    fn drain_requests(&mut self) -> Vec<RawRequestRecord>;
}

impl RequestSource for Vec<RawRequestRecord> {
    fn drain_requests(&mut self) -> Vec<RawRequestRecord> {
        std::mem::take(self)
    }
}

/// Drives one session: owns its log and its own request filter.
#[derive(Debug)]
pub struct SessionRecorder {
    log: SessionLog,
    filter: RequestFilter,
}

impl SessionRecorder {
    pub fn start(start_url: &str, policy: FilterPolicy) -> Self {
        Self::resume(Session::new(start_url), policy)
    }

    /// Record into an already identified session (replayed captures carry their own ids).
    pub fn resume(session: Session, policy: FilterPolicy) -> Self {
        debug!(session_id = %session.session_id, url = %session.session_start_url, "session started");
        Self {
            log: SessionLog::new(session),
            filter: RequestFilter::new(policy),
        }
    }

    pub fn session(&self) -> &Session {
        self.log.session()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn record_interaction(&mut self, event: InteractionEvent) {
        let policy = self.filter.policy();
        let event = event.normalized(policy.element_text_chars, policy.max_field_chars);
        self.log.append_interaction(event);
    }

    /// Drain `source` once and append every retained request, labelled with
    /// `action`. Returns how many were retained.
    pub fn capture_network<S>(&mut self, source: &mut S, page_url: &str, action: &str) -> usize
    where
        S: RequestSource + ?Sized,
    {
        self.capture_network_at(source, page_url, action, Utc::now())
    }

    pub fn capture_network_at<S>(
        &mut self,
        source: &mut S,
        page_url: &str,
        action: &str,
        captured_at: DateTime<Utc>,
    ) -> usize
    where
        S: RequestSource + ?Sized,
    {
        let context = CaptureContext::new(page_url, action, captured_at);
        let drained = source.drain_requests();
        let retained = self.filter.filter_all(&drained, &context);
        let count = retained.len();
        debug!(
            session_id = %self.log.session().session_id,
            action,
            drained = drained.len(),
            retained = count,
            "network captured"
        );
        for event in retained {
            self.log.append_network(event);
        }
        count
    }

    pub fn finish(self) -> ClosedSession {
        self.finish_at(Utc::now())
    }

    pub fn finish_at(self, ended_at: DateTime<Utc>) -> ClosedSession {
        self.close(ended_at, false)
    }

    /// Close early. The reason is kept as an `error` interaction and the session
    /// is flagged partial; everything captured so far is kept.
    pub fn abort(self, reason: &str) -> ClosedSession {
        self.abort_at(reason, Utc::now())
    }

    pub fn abort_at(mut self, reason: &str, at: DateTime<Utc>) -> ClosedSession {
        let event = InteractionEvent::new(EventType::Error, at).with_details(reason);
        self.record_interaction(event);
        self.close(at, true)
    }

    fn close(self, ended_at: DateTime<Utc>, partial: bool) -> ClosedSession {
        let session = self.log.session().clone();
        let (interactions, network_events) = self.log.close();
        debug!(
            session_id = %session.session_id,
            interactions = interactions.len(),
            network_events = network_events.len(),
            partial,
            "session closed"
        );
        ClosedSession {
            session,
            ended_at,
            interactions,
            network_events,
            partial,
        }
    }
}

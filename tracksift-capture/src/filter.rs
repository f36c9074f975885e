// Decides which observed requests are kept as tracking-relevant network events

use crate::domain::{is_first_party, main_domain};
use crate::policy::FilterPolicy;
use crate::record::{NetworkEvent, RawRequestRecord, RawResponse};
use crate::{NOT_AVAILABLE, truncate_chars};
use chrono::{DateTime, Utc};
use tracing::trace;
use url::Url;

/// Why a third-party request was retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    /// POST/PUT/DELETE (or whatever the policy lists).
    DataSending,
    LongQuery,
    TrackingParam,
    /// Response status equal to the policy's beacon status (204).
    NoContent,
    SmallImage,
}

/// Outcome of the filter pipeline. Stages run in declaration order and the
/// first one that rejects a request wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Incomplete,
    StaticAsset,
    FirstParty,
    BenignDomain,
    NotRelevant,
    Retain(Relevance),
}

impl Verdict {
    pub fn is_retained(&self) -> bool {
        matches!(self, Verdict::Retain(_))
    }
}

/// Where and why a batch of requests is being captured.
#[derive(Debug, Clone)]
pub struct CaptureContext {
    pub page_url: String,
    pub page_main_domain: Option<String>,
    pub associated_action: String,
    pub captured_at: DateTime<Utc>,
}

impl CaptureContext {
    pub fn new(page_url: &str, associated_action: &str, captured_at: DateTime<Utc>) -> Self {
        Self {
            page_url: page_url.to_string(),
            page_main_domain: main_domain(page_url),
            associated_action: associated_action.to_string(),
            captured_at,
        }
    }
}

/// Stateless request filter. Calling it twice with the same input gives the same output.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    policy: FilterPolicy,
}

impl RequestFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Run the decision pipeline:
    /// completeness, static-asset exclusion, party classification, relevance.
    pub fn classify(&self, record: &RawRequestRecord, page_main_domain: Option<&str>) -> Verdict {
        let Some(response) = record.response.as_ref() else {
            return Verdict::Incomplete;
        };

        let content_type = response_content_type(response);
        if self.is_static_asset(&record.url, &content_type) {
            return Verdict::StaticAsset;
        }

        let request_domain = main_domain(&record.url);
        if is_first_party(request_domain.as_deref(), page_main_domain) {
            return Verdict::FirstParty;
        }
        if let Some(domain) = request_domain.as_deref()
            && self.policy.is_benign_domain(domain)
        {
            return Verdict::BenignDomain;
        }

        match self.relevance(record, response, &content_type) {
            Some(reason) => Verdict::Retain(reason),
            None => Verdict::NotRelevant,
        }
    }

    /// Filter one record, producing the retained summary if it passes every stage.
    pub fn filter(&self, record: &RawRequestRecord, context: &CaptureContext) -> Option<NetworkEvent> {
        let verdict = self.classify(record, context.page_main_domain.as_deref());
        let Verdict::Retain(reason) = verdict else {
            trace!(url = %record.url, ?verdict, "request discarded");
            return None;
        };
        // Retained implies a response is present
        let response = record.response.as_ref()?;
        let bound = self.policy.max_field_chars;

        let request_body_snippet = if reason == Relevance::DataSending {
            self.body_snippet(record)
        } else {
            NOT_AVAILABLE.to_string()
        };

        Some(NetworkEvent {
            capture_timestamp: context.captured_at,
            page_url: truncate_chars(&context.page_url, bound),
            associated_action: truncate_chars(&context.associated_action, bound),
            request_method: record.method.to_ascii_uppercase(),
            request_url: truncate_chars(&record.url, bound),
            response_status: response.status,
            response_reason: truncate_chars(
                response.reason.as_deref().unwrap_or(NOT_AVAILABLE),
                bound,
            ),
            request_referer: truncate_chars(
                record.headers.get("Referer").unwrap_or(NOT_AVAILABLE),
                bound,
            ),
            response_content_type: truncate_chars(&response_content_type(response), bound),
            request_body_snippet,
        })
    }

    /// Filter a drained batch, keeping insertion order.
    pub fn filter_all<'a, I>(&self, records: I, context: &CaptureContext) -> Vec<NetworkEvent>
    where
        I: IntoIterator<Item = &'a RawRequestRecord>,
    {
        records
            .into_iter()
            .filter_map(|record| self.filter(record, context))
            .collect()
    }

    fn is_static_asset(&self, url: &str, content_type: &str) -> bool {
        let path = url_path_lowercase(url);
        if self
            .policy
            .ignored_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            return true;
        }
        self.policy
            .ignored_content_type_prefixes
            .iter()
            .any(|prefix| content_type.starts_with(prefix.as_str()))
    }

    fn relevance(
        &self,
        record: &RawRequestRecord,
        response: &RawResponse,
        content_type: &str,
    ) -> Option<Relevance> {
        let method = record.method.to_ascii_uppercase();
        if self.policy.data_sending_methods.iter().any(|m| *m == method) {
            return Some(Relevance::DataSending);
        }
        if method != "GET" {
            return None;
        }

        let url_lower = record.url.to_lowercase();
        if record.url.contains('?') && record.url.chars().count() > self.policy.long_url_threshold {
            return Some(Relevance::LongQuery);
        }
        if self
            .policy
            .tracking_param_markers
            .iter()
            .any(|marker| url_lower.contains(marker.as_str()))
        {
            return Some(Relevance::TrackingParam);
        }
        if response.status == self.policy.beacon_status {
            return Some(Relevance::NoContent);
        }
        let body_len = response.body.as_ref().map_or(0, |b| b.len());
        if content_type.starts_with("image/") && body_len > 0 && body_len < self.policy.small_image_max_bytes {
            return Some(Relevance::SmallImage);
        }
        None
    }

    fn body_snippet(&self, record: &RawRequestRecord) -> String {
        let Some(body) = record.body.as_deref().filter(|b| !b.is_empty()) else {
            return NOT_AVAILABLE.to_string();
        };
        let content_type = record
            .headers
            .get("Content-Type")
            .unwrap_or("")
            .to_lowercase();
        let textual = self
            .policy
            .textual_body_markers
            .iter()
            .any(|marker| content_type.contains(marker.as_str()));

        if !textual {
            return format!(
                "[Non-text Body Present - Size: {} bytes, Type: {}]",
                body.len(),
                truncate_chars(&content_type, self.policy.max_field_chars)
            );
        }
        match std::str::from_utf8(body) {
            Ok(text) => truncate_chars(text, self.policy.body_snippet_chars),
            Err(_) => format!("[Binary or Undecodable Body - Size: {} bytes]", body.len()),
        }
    }
}

fn response_content_type(response: &RawResponse) -> String {
    response
        .headers
        .get("Content-Type")
        .unwrap_or("")
        .to_lowercase()
}

// Path without query/fragment; unparseable URLs fall back to a manual split
fn url_path_lowercase(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_path_lowercase_strips_query() {
        assert_eq!(url_path_lowercase("https://t.example/PIX.GIF?a=1"), "/pix.gif");
        assert_eq!(url_path_lowercase("//t.example/a.css#x"), "//t.example/a.css");
    }
}

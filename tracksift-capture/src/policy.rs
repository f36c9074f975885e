// Tunable thresholds and pattern lists for the request filter

use crate::error::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Heuristic constants used by [`crate::RequestFilter`].
///
/// Defaults are the crawler's reference values. Any field can be overridden
/// from a JSON file; fields missing from the file keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPolicy {
    /// Request paths ending in one of these are static assets.
    pub ignored_extensions: Vec<String>,
    /// Response content types starting with one of these are static assets.
    pub ignored_content_type_prefixes: Vec<String>,
    /// Third-party domains (suffix match) never worth retaining. Empty by default.
    pub benign_domain_suffixes: Vec<String>,
    /// Methods retained unconditionally for third-party requests.
    pub data_sending_methods: Vec<String>,
    /// A GET URL with a query string longer than this is retained.
    pub long_url_threshold: usize,
    /// Substrings of the lower-cased URL that mark a GET as tracking.
    pub tracking_param_markers: Vec<String>,
    /// Response status of a GET that marks it as a beacon.
    pub beacon_status: u16,
    /// Image responses with a body shorter than this are treated as pixels.
    pub small_image_max_bytes: usize,
    /// Request content types whose bodies are decoded as text.
    pub textual_body_markers: Vec<String>,
    pub body_snippet_chars: usize,
    pub element_text_chars: usize,
    /// Bound for every other free-text field of a retained event.
    pub max_field_chars: usize,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            ignored_extensions: to_strings(&[
                ".css", ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".woff",
                ".woff2", ".ttf", ".otf", ".eot", ".mp4", ".webm", ".ogg", ".mp3", ".wav",
            ]),
            ignored_content_type_prefixes: to_strings(&[
                "image/", "font/", "text/css", "video/", "audio/",
            ]),
            benign_domain_suffixes: Vec::new(),
            data_sending_methods: to_strings(&["POST", "PUT", "DELETE"]),
            long_url_threshold: 150,
            tracking_param_markers: to_strings(&[
                "utm_", "gclid=", "client_id=", "user_id=", "uid=", "event=", "beacon",
            ]),
            beacon_status: 204,
            small_image_max_bytes: 500,
            textual_body_markers: to_strings(&["json", "x-www-form-urlencoded", "text/plain"]),
            body_snippet_chars: 200,
            element_text_chars: 100,
            max_field_chars: 2048,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl FilterPolicy {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut policy: FilterPolicy = serde_json::from_str(json)?;
        policy.normalize();
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    // Matching is done against lower-cased URLs/content types and upper-cased methods
    fn normalize(&mut self) {
        for list in [
            &mut self.ignored_extensions,
            &mut self.ignored_content_type_prefixes,
            &mut self.benign_domain_suffixes,
            &mut self.tracking_param_markers,
            &mut self.textual_body_markers,
        ] {
            for value in list.iter_mut() {
                *value = value.to_lowercase();
            }
        }
        for method in self.data_sending_methods.iter_mut() {
            *method = method.to_ascii_uppercase();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ext) = self.ignored_extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(CaptureError::Policy(format!(
                "extension '{}' must start with '.'",
                ext
            )));
        }
        if self.body_snippet_chars == 0 || self.max_field_chars == 0 {
            return Err(CaptureError::Policy(
                "text bounds must be greater than zero".to_string(),
            ));
        }
        if self.tracking_param_markers.iter().any(|m| m.is_empty()) {
            return Err(CaptureError::Policy(
                "tracking parameter markers must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_benign_domain(&self, domain: &str) -> bool {
        self.benign_domain_suffixes
            .iter()
            .any(|suffix| domain == suffix || domain.ends_with(&format!(".{}", suffix)))
    }
}

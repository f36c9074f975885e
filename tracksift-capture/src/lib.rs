pub mod domain;
pub mod error;
pub mod filter;
pub mod policy;
pub mod record;

pub use domain::{is_first_party, main_domain};
pub use error::CaptureError;
pub use filter::{CaptureContext, Relevance, RequestFilter, Verdict};
pub use policy::FilterPolicy;
pub use record::{Headers, NetworkEvent, RawRequestRecord, RawResponse};

/// Placeholder written for absent optional text values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Truncate `text` to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

// Interaction events observed while a session is being driven

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracksift_capture::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageVisit,
    MouseMove,
    MouseMoveToElement,
    Click,
    AttemptCookieBannerDismiss,
    CookieBannerDismissed,
    SkipInteraction,
    Error,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::PageVisit,
        EventType::MouseMove,
        EventType::MouseMoveToElement,
        EventType::Click,
        EventType::AttemptCookieBannerDismiss,
        EventType::CookieBannerDismissed,
        EventType::SkipInteraction,
        EventType::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageVisit => "page_visit",
            EventType::MouseMove => "mouse_move",
            EventType::MouseMoveToElement => "mouse_move_to_element",
            EventType::Click => "click",
            EventType::AttemptCookieBannerDismiss => "attempt_cookie_banner_dismiss",
            EventType::CookieBannerDismissed => "cookie_banner_dismissed",
            EventType::SkipInteraction => "skip_interaction",
            EventType::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        EventType::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// What was known about the DOM element an event targeted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ElementInfo {
    Present {
        tag: String,
        #[serde(default)]
        text: Option<String>,
    },
    /// The element went stale or could not be introspected.
    Unavailable,
}

impl ElementInfo {
    pub fn tag(&self) -> &str {
        match self {
            ElementInfo::Present { tag, .. } => tag,
            ElementInfo::Unavailable => "Error retrieving tag",
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ElementInfo::Present { text, .. } => text.as_deref(),
            ElementInfo::Unavailable => Some("Error retrieving text"),
        }
    }
}

/// One observed user or browser-driven action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Page active when the event fired, if the driver could report it.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pos_x: Option<f64>,
    #[serde(default)]
    pub pos_y: Option<f64>,
    #[serde(default)]
    pub element: Option<ElementInfo>,
    #[serde(default)]
    pub details: Option<String>,
}

impl InteractionEvent {
    pub fn new(event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            event_type,
            url: None,
            pos_x: None,
            pos_y: None,
            element: None,
            details: None,
        }
    }

    pub fn at_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn at_position(mut self, x: f64, y: f64) -> Self {
        self.pos_x = Some(x);
        self.pos_y = Some(y);
        self
    }

    pub fn with_element(mut self, tag: &str, text: Option<&str>) -> Self {
        self.element = Some(ElementInfo::Present {
            tag: tag.to_string(),
            text: text.map(|t| t.to_string()),
        });
        self
    }

    pub fn with_unavailable_element(mut self) -> Self {
        self.element = Some(ElementInfo::Unavailable);
        self
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        self.pos_x.zip(self.pos_y)
    }

    /// Bound free-text fields: element text to `element_text_chars`, everything else
    /// to `max_field_chars`.
    pub fn normalized(mut self, element_text_chars: usize, max_field_chars: usize) -> Self {
        if let Some(ElementInfo::Present { tag, text }) = self.element.as_mut() {
            *tag = truncate_chars(tag, max_field_chars);
            *text = text
                .as_deref()
                .and_then(|t| normalize_element_text(t, element_text_chars));
        }
        self.url = self.url.map(|u| truncate_chars(&u, max_field_chars));
        self.details = self.details.map(|d| truncate_chars(&d, max_field_chars));
        self
    }
}

/// Newlines become spaces, surrounding whitespace is trimmed, then the text is
/// cut to `max_chars`. Empty text becomes `None`.
pub fn normalize_element_text(text: &str, max_chars: usize) -> Option<String> {
    let flattened = text.replace(['\r', '\n'], " ");
    let trimmed = flattened.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(truncate_chars(trimmed, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trips_through_str() {
        for event_type in EventType::ALL {
            assert_eq!(EventType::from_str(event_type.as_str()), Some(event_type));
        }
        assert_eq!(EventType::from_str("scroll"), None);
    }

    #[test]
    fn test_event_type_serde_name_matches_as_str() {
        let json = serde_json::to_string(&EventType::AttemptCookieBannerDismiss).unwrap();
        assert_eq!(json, "\"attempt_cookie_banner_dismiss\"");
    }

    #[test]
    fn test_normalize_element_text() {
        assert_eq!(
            normalize_element_text("  Accept\nall cookies \n", 100),
            Some("Accept all cookies".to_string())
        );
        assert_eq!(normalize_element_text(" \n ", 100), None);
        assert_eq!(normalize_element_text(&"a".repeat(150), 100).map(|t| t.len()), Some(100));
    }

    #[test]
    fn test_unavailable_element_placeholders() {
        let element = ElementInfo::Unavailable;
        assert_eq!(element.tag(), "Error retrieving tag");
        assert_eq!(element.text(), Some("Error retrieving text"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP header collection with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Response half of an observed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    pub status: u16,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "body_bytes")]
    pub body: Option<Vec<u8>>,
}

/// One HTTP exchange as delivered by the browser instrumentation layer.
///
/// `response` is `None` when the exchange never completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRequestRecord {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "body_bytes")]
    pub body: Option<Vec<u8>>,
    #[serde(default)]
    pub response: Option<RawResponse>,
    pub timestamp: DateTime<Utc>,
}

impl RawRequestRecord {
    pub fn new(method: &str, url: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
            headers: Headers::new(),
            body: None,
            response: None,
            timestamp,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_response(mut self, response: RawResponse) -> Self {
        self.response = Some(response);
        self
    }
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.headers.insert("Content-Type", content_type);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Retained, redacted summary of a third-party request judged tracking-relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub capture_timestamp: DateTime<Utc>,
    pub page_url: String,
    pub associated_action: String,
    pub request_method: String,
    pub request_url: String,
    pub response_status: u16,
    pub response_reason: String,
    pub request_referer: String,
    pub response_content_type: String,
    pub request_body_snippet: String,
}

// Bodies arrive either as text or as a raw byte array in capture files.
mod body_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            None => serializer.serialize_none(),
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => serializer.serialize_some(text),
                Err(_) => serializer.serialize_some(bytes),
            },
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let repr = Option::<Repr>::deserialize(deserializer)?;
        Ok(repr.map(|r| match r {
            Repr::Text(text) => text.into_bytes(),
            Repr::Bytes(bytes) => bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let headers: Headers = [("content-type", "application/json")].into_iter().collect();
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.get("Referer"), None);
    }

    #[test]
    fn test_body_accepts_text_or_bytes() {
        let text = r#"{"url":"https://a.example/","method":"POST","body":"a=1","timestamp":"2025-05-01T10:00:00Z"}"#;
        let record: RawRequestRecord = serde_json::from_str(text).unwrap();
        assert_eq!(record.body.as_deref(), Some(&b"a=1"[..]));

        let bytes = r#"{"url":"https://a.example/","method":"POST","body":[255,0,1],"timestamp":"2025-05-01T10:00:00Z"}"#;
        let record: RawRequestRecord = serde_json::from_str(bytes).unwrap();
        assert_eq!(record.body, Some(vec![255, 0, 1]));
        assert!(record.response.is_none());
    }

    #[test]
    fn test_invalid_utf8_body_serializes_as_bytes() {
        let ts = "2025-05-01T10:00:00Z".parse().unwrap();
        let record = RawRequestRecord::new("POST", "https://a.example/", ts).with_body(vec![0xff, 0xfe]);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("[255,254]"));
    }
}

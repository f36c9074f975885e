// Tests for filter policy loading and validation

use std::io::Write;
use tempfile::NamedTempFile;
use tracksift_capture::{CaptureError, FilterPolicy};

#[test]
fn test_default_policy_is_valid() {
    let policy = FilterPolicy::default();
    assert!(policy.validate().is_ok());
    assert_eq!(policy.long_url_threshold, 150);
    assert_eq!(policy.beacon_status, 204);
    assert_eq!(policy.body_snippet_chars, 200);
    assert!(policy.benign_domain_suffixes.is_empty());
    assert!(policy.ignored_extensions.contains(&".woff2".to_string()));
}

#[test]
fn test_partial_json_keeps_defaults() {
    let policy = FilterPolicy::from_json_str(r#"{"long_url_threshold": 300}"#).unwrap();
    assert_eq!(policy.long_url_threshold, 300);
    assert_eq!(policy.beacon_status, 204);
    assert_eq!(policy.data_sending_methods, vec!["POST", "PUT", "DELETE"]);
}

#[test]
fn test_empty_object_equals_default() {
    let policy = FilterPolicy::from_json_str("{}").unwrap();
    assert_eq!(policy, FilterPolicy::default());
}

#[test]
fn test_lists_are_normalized() {
    let policy = FilterPolicy::from_json_str(
        r#"{"data_sending_methods": ["post", "Patch"], "tracking_param_markers": ["FBCLID="], "benign_domain_suffixes": ["CDN.Example"]}"#,
    )
    .unwrap();
    assert_eq!(policy.data_sending_methods, vec!["POST", "PATCH"]);
    assert_eq!(policy.tracking_param_markers, vec!["fbclid="]);
    assert!(policy.is_benign_domain("cdn.example"));
}

#[test]
fn test_extension_without_dot_is_rejected() {
    let result = FilterPolicy::from_json_str(r#"{"ignored_extensions": ["css"]}"#);
    assert!(matches!(result, Err(CaptureError::Policy(_))));
}

#[test]
fn test_zero_bounds_are_rejected() {
    let result = FilterPolicy::from_json_str(r#"{"body_snippet_chars": 0}"#);
    assert!(matches!(result, Err(CaptureError::Policy(_))));
    let result = FilterPolicy::from_json_str(r#"{"max_field_chars": 0}"#);
    assert!(matches!(result, Err(CaptureError::Policy(_))));
}

#[test]
fn test_empty_marker_is_rejected() {
    let result = FilterPolicy::from_json_str(r#"{"tracking_param_markers": ["utm_", ""]}"#);
    assert!(matches!(result, Err(CaptureError::Policy(_))));
}

#[test]
fn test_malformed_json_is_a_json_error() {
    let result = FilterPolicy::from_json_str("{ not json");
    assert!(matches!(result, Err(CaptureError::JsonError(_))));
}

#[test]
fn test_policy_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"beacon_status": 202, "small_image_max_bytes": 64}}"#).unwrap();

    let policy = FilterPolicy::from_file(file.path()).unwrap();
    assert_eq!(policy.beacon_status, 202);
    assert_eq!(policy.small_image_max_bytes, 64);
}

#[test]
fn test_missing_policy_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = FilterPolicy::from_file(&dir.path().join("absent.json"));
    assert!(matches!(result, Err(CaptureError::IoError(_))));
}

#[test]
fn test_benign_suffix_matching() {
    let policy = FilterPolicy {
        benign_domain_suffixes: vec!["gstatic.com".to_string()],
        ..FilterPolicy::default()
    };
    assert!(policy.is_benign_domain("gstatic.com"));
    assert!(policy.is_benign_domain("fonts.gstatic.com"));
    assert!(!policy.is_benign_domain("notgstatic.com"));
}

// Tests for main-domain extraction and party classification

use tracksift_capture::{is_first_party, main_domain};

// ============================================================================
// Main Domain Tests
// ============================================================================

#[test]
fn test_main_domain_strips_www() {
    assert_eq!(
        main_domain("https://www.example.com/a"),
        Some("example.com".to_string())
    );
}

#[test]
fn test_main_domain_equal_across_scheme_and_subdomain() {
    let a = main_domain("https://www.example.com/a");
    let b = main_domain("http://example.com/b");
    assert_eq!(a, b);
    assert_eq!(a.as_deref(), Some("example.com"));
}

#[test]
fn test_main_domain_deep_subdomain() {
    assert_eq!(
        main_domain("https://a.b.cdn.tracker.example/x.js"),
        Some("tracker.example".to_string())
    );
}

#[test]
fn test_main_domain_without_scheme() {
    assert_eq!(main_domain("www.allrecipes.com"), Some("allrecipes.com".to_string()));
    assert_eq!(
        main_domain("food.com/recipe/butter-chicken-88578"),
        Some("food.com".to_string())
    );
}

#[test]
fn test_main_domain_protocol_relative() {
    assert_eq!(
        main_domain("//cdn.tracker.example/pixel"),
        Some("tracker.example".to_string())
    );
}

#[test]
fn test_main_domain_single_label_host() {
    assert_eq!(main_domain("http://localhost:3000/api"), Some("localhost".to_string()));
    assert_eq!(main_domain("localhost:8080"), Some("localhost".to_string()));
}

#[test]
fn test_main_domain_ignores_port_and_credentials() {
    assert_eq!(
        main_domain("https://user:pw@shop.example:8443/cart"),
        Some("shop.example".to_string())
    );
}

#[test]
fn test_main_domain_is_lowercased() {
    assert_eq!(main_domain("HTTPS://WWW.Example.COM/"), Some("example.com".to_string()));
}

#[test]
fn test_main_domain_multi_label_suffix_limitation() {
    // Known simplification: public suffixes like co.uk are not recognised
    assert_eq!(main_domain("https://www.bbc.co.uk/food"), Some("co.uk".to_string()));
    assert_eq!(main_domain("https://news.bbc.co.uk/"), main_domain("https://shop.other.co.uk/"));
}

#[test]
fn test_main_domain_ip_literals() {
    assert_eq!(main_domain("http://192.168.1.1/admin"), Some("192.168.1.1".to_string()));
    assert_eq!(main_domain("http://[::1]/api"), Some("::1".to_string()));
}

#[test]
fn test_main_domain_empty_input() {
    assert_eq!(main_domain(""), None);
    assert_eq!(main_domain("   "), None);
}

#[test]
fn test_main_domain_unparseable() {
    assert_eq!(main_domain("not a valid url"), None);
    assert_eq!(main_domain("http://"), None);
}

// ============================================================================
// Party Classification Tests
// ============================================================================

#[test]
fn test_same_domain_is_first_party() {
    assert!(is_first_party(Some("shop.example"), Some("shop.example")));
}

#[test]
fn test_subdomain_suffix_is_first_party() {
    assert!(is_first_party(Some("api.shop.example"), Some("shop.example")));
}

#[test]
fn test_suffix_without_dot_is_third_party() {
    assert!(!is_first_party(Some("evilshop.example"), Some("shop.example")));
}

#[test]
fn test_other_domain_is_third_party() {
    assert!(!is_first_party(Some("tracker.example"), Some("shop.example")));
}

#[test]
fn test_unknown_page_domain_defaults_to_third_party() {
    assert!(!is_first_party(Some("shop.example"), None));
}

#[test]
fn test_unknown_request_domain_defaults_to_third_party() {
    assert!(!is_first_party(None, Some("shop.example")));
    assert!(!is_first_party(None, None));
}

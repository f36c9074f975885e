// Registrable-domain approximation used for first/third-party decisions

use url::{Host, Url};

/// Extract the "main" domain of a URL, hostname or protocol-relative URL.
///
/// Hosts with more than one label collapse to their last two labels, so
/// `www.example.com` becomes `example.com`. Multi-label public suffixes are not
/// special-cased: `www.bbc.co.uk` becomes `co.uk`. IP literals are returned as-is.
///
/// Returns `None` when no hostname can be parsed; never panics.
pub fn main_domain(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    match parse_host(trimmed)? {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.');
            if domain.is_empty() {
                return None;
            }
            let labels: Vec<&str> = domain.split('.').collect();
            if labels.len() > 1 {
                Some(labels[labels.len() - 2..].join("."))
            } else {
                Some(domain.to_string())
            }
        }
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

fn parse_host(input: &str) -> Option<Host<String>> {
    let candidate = if input.starts_with("//") {
        format!("http:{}", input)
    } else if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        // Other schemes are accepted as long as they carry a host
        if let Ok(parsed) = Url::parse(input)
            && let Some(host) = parsed.host()
        {
            return Some(host.to_owned());
        }
        format!("http://{}", input)
    };

    Url::parse(&candidate)
        .ok()
        .and_then(|parsed| parsed.host().map(|h| h.to_owned()))
}

/// A request is first-party when both main domains are known and the request's
/// domain equals the page's domain or is a subdomain of it.
///
/// An unknown domain on either side counts as third-party.
pub fn is_first_party(request_main_domain: Option<&str>, page_main_domain: Option<&str>) -> bool {
    match (request_main_domain, page_main_domain) {
        (Some(request), Some(page)) => {
            request == page || request.ends_with(&format!(".{}", page))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_dot_is_ignored() {
        assert_eq!(main_domain("https://www.example.com./x"), Some("example.com".to_string()));
    }

    #[test]
    fn test_non_http_scheme_with_host() {
        assert_eq!(main_domain("wss://socket.tracker.example/ws"), Some("tracker.example".to_string()));
    }
}

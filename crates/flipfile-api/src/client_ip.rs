//! Client IP extraction
//!
//! Rate limiting keys on the caller's IP. Behind a proxy the peer address is
//! the proxy, so X-Forwarded-For is consulted first, validated against the
//! configured number of trusted proxies to prevent header spoofing.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Extract and validate the client IP from request headers.
///
/// Falls back to the direct socket address when headers are absent or fail
/// validation; returns "unknown" only when nothing usable exists.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&std::net::SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(header_value) = forwarded_for.to_str() {
            let ip = extract_from_forwarded_for(header_value, trusted_proxy_count);
            if ip != "unknown" {
                return ip;
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(header_value) = real_ip.to_str() {
            let trimmed = header_value.trim();
            if is_valid_ip(trimmed) {
                return trimmed.to_string();
            }
        }
    }

    if let Some(addr) = socket_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// X-Forwarded-For carries `client, proxy1, proxy2, ...`. With N trusted
/// proxies at the end of the chain, the client is the entry before them.
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> String {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if ips.is_empty() {
        return "unknown".to_string();
    }

    // With no trusted proxies the header is spoofable; only the last hop
    // (closest to us) is worth anything.
    let position = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.len() - 1
    } else {
        ips.len() - trusted_proxy_count - 1
    };

    let candidate = ips.get(position).copied().unwrap_or("");
    if is_valid_ip(candidate) {
        candidate.to_string()
    } else {
        "unknown".to_string()
    }
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_single_ip() {
        assert_eq!(extract_from_forwarded_for("192.168.1.1", 0), "192.168.1.1");
        assert_eq!(extract_from_forwarded_for("192.168.1.1", 1), "192.168.1.1");
    }

    #[test]
    fn test_client_before_trusted_proxy() {
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1, 10.0.0.1", 1),
            "192.168.1.1"
        );
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1, 10.0.0.1, 10.0.0.2", 2),
            "192.168.1.1"
        );
    }

    #[test]
    fn test_untrusted_header_uses_last_hop() {
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1, 10.0.0.1", 0),
            "10.0.0.1"
        );
    }

    #[test]
    fn test_invalid_ip_rejected() {
        assert_eq!(extract_from_forwarded_for("not.an.ip.address", 0), "unknown");
        assert!(!is_valid_ip("999.999.999.999"));
        assert!(is_valid_ip("::1"));
    }

    #[test]
    fn test_fallback_to_socket_then_unknown() {
        let headers = HeaderMap::new();
        let socket = std::net::SocketAddr::from(([127, 0, 0, 1], 8080));
        assert_eq!(extract_client_ip(&headers, Some(&socket), 0), "127.0.0.1");
        assert_eq!(extract_client_ip(&headers, None, 0), "unknown");
    }

    #[test]
    fn test_header_wins_over_socket() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let socket = std::net::SocketAddr::from(([10, 0, 0, 1], 80));
        assert_eq!(
            extract_client_ip(&headers, Some(&socket), 1),
            "203.0.113.9"
        );
    }
}

//! Client identity as seen behind proxies.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Resolve the caller's identity, used as the throttling key.
///
/// Priority: first `X-Forwarded-For` entry, `X-Real-IP`, the transport peer
/// address, then the literal `"unknown"`.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    // Try X-Forwarded-For header first
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    // Try X-Real-IP header
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return real_ip.to_string();
    }

    // Fall back to connection socket address
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.9:51000".parse().unwrap())
    }

    #[test]
    fn forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_identity(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn real_ip_is_second() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_identity(&headers, peer()), "198.51.100.2");
    }

    #[test]
    fn peer_then_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(client_identity(&headers, peer()), "10.0.0.9");
        assert_eq!(client_identity(&headers, None), "unknown");
    }

    #[test]
    fn blank_headers_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(client_identity(&headers, None), "unknown");
    }
}

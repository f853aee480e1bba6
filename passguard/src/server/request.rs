use std::net::SocketAddr;

use http::HeaderMap;

use crate::identity::RequestView;

/// Identity view over hyper request parts.
pub struct HttpRequestView<'a> {
    headers: &'a HeaderMap,
    peer: Option<SocketAddr>,
}

impl<'a> HttpRequestView<'a> {
    pub fn new(headers: &'a HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self { headers, peer }
    }
}

impl RequestView for HttpRequestView<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

const MAX_REQUEST_ID_LEN: usize = 64;

/// Reuses a sane inbound `x-request-id`, otherwise makes one up.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| {
            !s.is_empty()
                && s.len() <= MAX_REQUEST_ID_LEN
                && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:016x}", rand::random::<u64>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut h = HeaderMap::new();
        h.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.4"));
        let view = HttpRequestView::new(&h, None);
        assert_eq!(view.header("x-forwarded-for"), Some("203.0.113.4"));
        assert_eq!(view.header("X-FORWARDED-FOR"), Some("203.0.113.4"));
    }

    #[test]
    fn request_id_reused_or_generated() {
        let mut h = HeaderMap::new();
        h.insert("x-request-id", HeaderValue::from_static("edge-42"));
        assert_eq!(request_id(&h), "edge-42");

        h.insert("x-request-id", HeaderValue::from_static("bad id"));
        let id = request_id(&h);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

use http::header::{self, HeaderValue};
use http::StatusCode;
use serde::Deserialize;

use super::response::{self, ApiResponse};

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";
const EXPOSE_HEADERS: &str = "Retry-After, X-Request-Id";
const MAX_AGE_SECS: &str = "86400";

/// Browser origins allowed to call the API with credentials.
///
/// Requests without an `Origin` header are not cross-origin and pass
/// untouched. An empty list refuses every cross-origin caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CorsPolicy {
    pub allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_origins: origins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for o in &self.allowed_origins {
            let o = o.trim();
            anyhow::ensure!(!o.is_empty(), "cors.allowed_origins has an empty entry");
            anyhow::ensure!(o != "*", "cors.allowed_origins must list origins explicitly, not '*'");
            anyhow::ensure!(
                o.starts_with("http://") || o.starts_with("https://"),
                "cors origin {:?} must start with http:// or https://",
                o
            );
            HeaderValue::from_str(o)
                .map_err(|_| anyhow::anyhow!("cors origin {:?} is not a valid header value", o))?;
        }
        Ok(())
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o.trim() == origin)
    }

    /// Answers an `OPTIONS` request for a known route.
    pub fn preflight(&self, origin: Option<&str>, allow: &'static str) -> ApiResponse {
        let mut resp = response::empty(StatusCode::NO_CONTENT);
        resp.headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static(allow));

        let Some(origin) = origin else {
            return resp;
        };
        if !self.allows(origin) {
            tracing::info!(origin, "cors preflight refused");
            return response::error(StatusCode::FORBIDDEN, "Origin not allowed");
        }

        self.decorate(&mut resp, Some(origin));
        let h = resp.headers_mut();
        h.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        h.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        h.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(MAX_AGE_SECS),
        );
        resp
    }

    /// Adds the allow headers when the request comes from a listed origin.
    pub fn decorate(&self, resp: &mut ApiResponse, origin: Option<&str>) {
        if self.allowed_origins.is_empty() {
            return;
        }
        let h = resp.headers_mut();
        h.append(header::VARY, HeaderValue::from_static("Origin"));

        let Some(origin) = origin.filter(|o| self.allows(o)) else {
            return;
        };
        if let Ok(v) = HeaderValue::from_str(origin) {
            h.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, v);
            h.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            h.insert(
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(EXPOSE_HEADERS),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(["https://app.example.com", " https://beta.example.com "])
    }

    #[test]
    fn wildcard_and_bare_hosts_are_refused() {
        assert!(CorsPolicy::new(["*"]).validate().is_err());
        assert!(CorsPolicy::new(["app.example.com"]).validate().is_err());
        assert!(CorsPolicy::new([""]).validate().is_err());
        policy().validate().unwrap();
        CorsPolicy::default().validate().unwrap();
    }

    #[test]
    fn listed_origins_match_exactly() {
        let p = policy();
        assert!(p.allows("https://app.example.com"));
        assert!(p.allows("https://beta.example.com"));
        assert!(!p.allows("https://app.example.com.evil.test"));
        assert!(!p.allows("http://app.example.com"));
    }

    #[test]
    fn preflight_from_listed_origin() {
        let resp = policy().preflight(Some("https://app.example.com"), "POST, OPTIONS");
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let h = resp.headers();
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example.com");
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(h[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert_eq!(h[header::VARY], "Origin");
    }

    #[test]
    fn options_without_origin_is_plain() {
        let resp = policy().preflight(None, "GET, OPTIONS");
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.headers()[header::ALLOW], "GET, OPTIONS");
        assert!(!resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[test]
    fn preflight_from_other_origin_is_forbidden() {
        let resp = policy().preflight(Some("https://evil.test"), "POST, OPTIONS");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(!resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let resp = CorsPolicy::default().preflight(Some("https://app.example.com"), "GET, OPTIONS");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn decorate_only_for_listed_origin() {
        let p = policy();
        let mut resp = response::empty(StatusCode::OK);
        p.decorate(&mut resp, Some("https://evil.test"));
        assert!(!resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(resp.headers()[header::VARY], "Origin");

        let mut resp = response::empty(StatusCode::OK);
        p.decorate(&mut resp, None);
        assert!(!resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let mut resp = response::empty(StatusCode::OK);
        p.decorate(&mut resp, Some("https://beta.example.com"));
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://beta.example.com"
        );
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde_json::json;

pub type ApiResponse = Response<Full<Bytes>>;

const SECURITY_HEADERS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (header::CACHE_CONTROL, "no-store"),
];

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn build(status: StatusCode, content_type: &'static str, body: Bytes) -> ApiResponse {
    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

pub fn json<T: Serialize>(status: StatusCode, body: &T) -> ApiResponse {
    match serde_json::to_vec(body) {
        Ok(buf) => build(status, "application/json", Bytes::from(buf)),
        Err(e) => {
            tracing::error!("serialize response failed: {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

pub fn error(status: StatusCode, message: &str) -> ApiResponse {
    let body = json!({ "error": message }).to_string();
    build(status, "application/json", Bytes::from(body))
}

/// 429 with both the header and the body field carrying the wait.
pub fn rejected(reason: &str, retry_after_secs: u64) -> ApiResponse {
    let body = json!({ "error": reason, "retryAfter": retry_after_secs }).to_string();
    let mut resp = build(
        StatusCode::TOO_MANY_REQUESTS,
        "application/json",
        Bytes::from(body),
    );
    resp.headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    resp
}

pub fn method_not_allowed(allow: &'static str) -> ApiResponse {
    let mut resp = error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    resp.headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(allow));
    resp
}

pub fn empty(status: StatusCode) -> ApiResponse {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

pub fn text(status: StatusCode, content_type: &'static str, body: String) -> ApiResponse {
    build(status, content_type, Bytes::from(body))
}

/// Stamps the headers every response carries.
pub fn finish(mut resp: ApiResponse, request_id: &str, set_cookie: Option<&str>) -> ApiResponse {
    let headers = resp.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if let Ok(v) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID, v);
    }
    if let Some(cookie) = set_cookie {
        match HeaderValue::from_str(cookie) {
            Ok(v) => {
                headers.append(header::SET_COOKIE, v);
            }
            Err(e) => tracing::warn!("invalid set-cookie value dropped: {}", e),
        }
    }
    resp
}

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use http::header::{CONTENT_LENGTH, ORIGIN, USER_AGENT};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use bytes::Bytes;
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use pingora::server::ShutdownWatch;
use pingora_core::services::background::BackgroundService;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use super::cors::CorsPolicy;
use super::request::{request_id, HttpRequestView};
use super::response::{self, ApiResponse};
use crate::generator::{
    generate_memorable_password, generate_passphrase, generate_random_passwords, GeneratorError,
    MemorableOptions, PassphraseOptions, RandomOptions,
};
use crate::guard::{AbuseGuard, Evaluation, Scope, Verdict};
use crate::metrics::{counters, registry};
use crate::obs::{AccessLog, GuardEvent, ObsSink};

/// Shared by every connection.
pub struct ApiState {
    pub guard: AbuseGuard,
    pub cors: CorsPolicy,
    pub obs: Option<ObsSink>,
    pub max_body_bytes: usize,
}

#[derive(Clone)]
pub struct ApiSvc {
    listen: String,
    state: Arc<ApiState>,
}

impl ApiSvc {
    pub fn new(listen: impl Into<String>, state: ApiState) -> Self {
        Self {
            listen: listen.into(),
            state: Arc::new(state),
        }
    }
}

#[async_trait]
impl BackgroundService for ApiSvc {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        let listener = match TcpListener::bind(&self.listen).await {
            Ok(l) => {
                tracing::info!("api listening on {}", self.listen);
                l
            }
            Err(e) => {
                tracing::error!("api bind {} failed: {}", self.listen, e);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("api service shutdown");
                    return;
                }
                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("api accept error: {}", e);
                            continue;
                        }
                    };

                    let state = self.state.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req| {
                            let state = state.clone();
                            async move { Ok::<_, Infallible>(handle(&state, req, Some(peer)).await) }
                        });

                        let builder = hyper::server::conn::http1::Builder::new();
                        if let Err(e) = builder.serve_connection(io, svc).await {
                            tracing::debug!(%peer, "api conn error: {}", e);
                        }
                    });
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Info,
    Health,
    Metrics,
    Random,
    Memorable,
    Passphrase,
}

impl Route {
    fn lookup(path: &str) -> Option<Self> {
        let route = match path {
            "/" => Route::Info,
            "/api/health" => Route::Health,
            "/metrics" => Route::Metrics,
            "/api/generator/random" => Route::Random,
            "/api/generator/memorable" => Route::Memorable,
            "/api/generator/passphrase" => Route::Passphrase,
            _ => return None,
        };
        Some(route)
    }

    fn method(self) -> Method {
        if self.is_generator() {
            Method::POST
        } else {
            Method::GET
        }
    }

    fn allow(self) -> &'static str {
        if self.is_generator() {
            "POST, OPTIONS"
        } else {
            "GET, OPTIONS"
        }
    }

    fn is_generator(self) -> bool {
        matches!(self, Route::Random | Route::Memorable | Route::Passphrase)
    }

    fn scope(self) -> Scope {
        match self {
            Route::Random | Route::Memorable | Route::Passphrase => Scope::Action,
            Route::Health => Scope::Health,
            Route::Info | Route::Metrics => Scope::Other,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Route::Info => "info",
            Route::Health => "health",
            Route::Metrics => "metrics",
            Route::Random => "random",
            Route::Memorable => "memorable",
            Route::Passphrase => "passphrase",
        }
    }
}

/// Per-request facts gathered for the access log.
#[derive(Default)]
struct Outcome {
    identity: Option<String>,
    identity_source: Option<String>,
    verdict: Option<&'static str>,
    set_cookie: Option<String>,
    error: Option<String>,
}

struct RequestMeta<'a> {
    request_id: &'a str,
    method: &'a Method,
    path: &'a str,
}

pub async fn handle<B>(state: &ApiState, req: Request<B>, peer: Option<SocketAddr>) -> ApiResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let rid = request_id(req.headers());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let meta = RequestMeta {
        request_id: &rid,
        method: &method,
        path: &path,
    };
    let route = Route::lookup(&path);
    let mut outcome = Outcome::default();

    // preflights and scrapes skip the guard; everything else is counted
    let resp = match route {
        Some(r) if method == Method::OPTIONS => state.cors.preflight(origin.as_deref(), r.allow()),
        Some(Route::Metrics) if method == Method::GET => serve_static(Route::Metrics),
        _ => guarded(state, route, req, peer, &meta, &mut outcome).await,
    };
    let mut resp = response::finish(resp, &rid, outcome.set_cookie.as_deref());
    if method != Method::OPTIONS || route.is_none() {
        state.cors.decorate(&mut resp, origin.as_deref());
    }

    let elapsed = started.elapsed();
    let label = route.map(Route::label).unwrap_or("unknown");
    counters::on_req_end(label, resp.status().as_u16(), elapsed.as_secs_f64());

    if let Some(obs) = &state.obs {
        obs.write_access(&AccessLog {
            ts: Utc::now(),
            request_id: rid.clone(),
            method: method.to_string(),
            path,
            status: resp.status().as_u16(),
            latency_ms: elapsed.as_millis() as u64,
            identity: outcome.identity,
            identity_source: outcome.identity_source,
            verdict: outcome.verdict,
            user_agent,
            error: outcome.error,
        });
    }
    resp
}

fn serve_static(route: Route) -> ApiResponse {
    match route {
        Route::Health => response::json(
            StatusCode::OK,
            &json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }),
        ),
        Route::Metrics => response::text(
            StatusCode::OK,
            registry::CONTENT_TYPE,
            registry::gather_as_text(),
        ),
        _ => response::json(
            StatusCode::OK,
            &json!({
                "name": "passguard",
                "version": env!("CARGO_PKG_VERSION"),
                "status": "running",
                "endpoints": {
                    "health": "GET /api/health",
                    "metrics": "GET /metrics",
                    "generator": {
                        "random": "POST /api/generator/random",
                        "memorable": "POST /api/generator/memorable",
                        "passphrase": "POST /api/generator/passphrase"
                    }
                }
            }),
        ),
    }
}

async fn guarded<B>(
    state: &ApiState,
    route: Option<Route>,
    req: Request<B>,
    peer: Option<SocketAddr>,
    meta: &RequestMeta<'_>,
    outcome: &mut Outcome,
) -> ApiResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    let scope = match route {
        Some(r) if parts.method == r.method() => r.scope(),
        _ => Scope::Other,
    };
    let eval = state
        .guard
        .evaluate_scoped(&HttpRequestView::new(&parts.headers, peer), scope);
    note_evaluation(state, &eval, meta, outcome);

    if let Verdict::Reject {
        reason,
        retry_after_secs,
        ..
    } = &eval.verdict
    {
        return response::rejected(reason, *retry_after_secs);
    }

    match route {
        None => response::error(StatusCode::NOT_FOUND, "Endpoint not found"),
        Some(r) if parts.method != r.method() => response::method_not_allowed(r.allow()),
        Some(r) if r.is_generator() => generate(state, r, &parts.headers, body, outcome).await,
        Some(r) => serve_static(r),
    }
}

async fn generate<B>(
    state: &ApiState,
    route: Route,
    headers: &HeaderMap,
    body: B,
    outcome: &mut Outcome,
) -> ApiResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = match read_body(headers, body, state.max_body_bytes).await {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match route {
        Route::Random => match parse::<RandomOptions>(&bytes) {
            Ok(opts) => generated(
                "random",
                generate_random_passwords(&opts).map(|passwords| json!({ "passwords": passwords })),
                opts.quantity,
                outcome,
            ),
            Err(resp) => resp,
        },
        Route::Memorable => match parse::<MemorableOptions>(&bytes) {
            Ok(opts) => generated(
                "memorable",
                generate_memorable_password(&opts).map(|password| json!({ "password": password })),
                1,
                outcome,
            ),
            Err(resp) => resp,
        },
        Route::Passphrase => match parse::<PassphraseOptions>(&bytes) {
            Ok(opts) => generated(
                "passphrase",
                generate_passphrase(&opts).map(|passphrase| json!({ "passphrase": passphrase })),
                1,
                outcome,
            ),
            Err(resp) => resp,
        },
        _ => response::error(StatusCode::NOT_FOUND, "Endpoint not found"),
    }
}

/// Copies the guard result into the access record and writes a guard event
/// for rejections and degraded admissions.
fn note_evaluation(state: &ApiState, eval: &Evaluation, meta: &RequestMeta<'_>, outcome: &mut Outcome) {
    outcome.verdict = Some(eval.verdict.kind_str());

    let event = |kind: &str, reason: &str, retry: Option<u64>| GuardEvent {
        ts: Utc::now(),
        request_id: meta.request_id.to_string(),
        identity: eval.identity.as_ref().map(|i| i.key.clone()).unwrap_or_default(),
        identity_source: eval
            .identity
            .as_ref()
            .map(|i| i.source.as_str().to_string())
            .unwrap_or_default(),
        kind: kind.to_string(),
        reason: reason.to_string(),
        retry_after_secs: retry,
        method: meta.method.to_string(),
        path: meta.path.to_string(),
    };

    let ev = match (&eval.identity, &eval.verdict) {
        (_, Verdict::Reject { kind, reason, retry_after_secs }) => {
            Some(event(kind.as_str(), reason.as_str(), Some(*retry_after_secs)))
        }
        (None, Verdict::Admit) => Some(event("fail_open", "identity resolution failed", None)),
        (Some(id), Verdict::Admit) if id.is_unknown() => {
            Some(event("unresolved", "no usable identity signal", None))
        }
        _ => None,
    };

    if let Some(id) = &eval.identity {
        outcome.identity = Some(id.key.clone());
        outcome.identity_source = Some(id.source.as_str().to_string());
        outcome.set_cookie = id.set_cookie.clone();
    }

    if let (Some(obs), Some(ev)) = (&state.obs, ev) {
        obs.write_event(&ev);
    }
}

async fn read_body<B>(headers: &HeaderMap, body: B, limit: usize) -> Result<Bytes, ApiResponse>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let too_large = || response::error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");

    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    if declared.is_some_and(|n| n > limit as u64) {
        return Err(too_large());
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(too_large()),
        Err(e) => {
            tracing::debug!("read request body failed: {}", e);
            Err(response::error(StatusCode::BAD_REQUEST, "Invalid request body"))
        }
    }
}

/// An empty body means "all defaults".
fn parse<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("invalid json body: {}", e);
        response::error(StatusCode::BAD_REQUEST, "Invalid JSON body")
    })
}

fn generated<T: Serialize>(
    mode: &str,
    res: Result<T, GeneratorError>,
    count: usize,
    outcome: &mut Outcome,
) -> ApiResponse {
    match res {
        Ok(body) => {
            counters::inc_generated(mode, count);
            response::json(StatusCode::OK, &body)
        }
        Err(GeneratorError::Validation(e)) => {
            let msg = e.to_string();
            outcome.error = Some(msg.clone());
            response::error(StatusCode::BAD_REQUEST, &msg)
        }
        Err(e) => {
            tracing::error!(mode, "generation failed: {}", e);
            outcome.error = Some(e.to_string());
            response::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate password")
        }
    }
}

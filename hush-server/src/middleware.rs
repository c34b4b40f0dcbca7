use crate::capture::{capture_prefix, is_streaming};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hush_core::{BodyCapture, ExchangeOverride, HeaderList, HushConfig, SettingsResolver};
use hush_interceptor::{LoggingInterceptor, RequestCapture, ResponseCapture, new_exchange_id};
use hush_observability::sink::LogSink;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Shared state for [`log_exchange`].
#[derive(Clone)]
pub struct HushState {
    pub resolver: Arc<SettingsResolver>,
    pub interceptor: Arc<LoggingInterceptor>,
    /// Settings attached where the layer is mounted; beat route and global settings.
    pub explicit: Option<Arc<ExchangeOverride>>,
    /// Response header that echoes the exchange id.
    pub id_header: Option<HeaderName>,
}

impl HushState {
    pub fn new(resolver: SettingsResolver, interceptor: LoggingInterceptor) -> Self {
        Self {
            resolver: Arc::new(resolver),
            interceptor: Arc::new(interceptor),
            explicit: None,
            id_header: None,
        }
    }

    pub fn from_config(config: &HushConfig, sink: Arc<dyn LogSink>) -> Self {
        let id_header = config.logging.id_header.as_deref().and_then(|name| {
            HeaderName::try_from(name)
                .map_err(|e| warn!(header = %name, error = %e, "Invalid id header name, not echoing exchange ids"))
                .ok()
        });
        Self {
            resolver: Arc::new(SettingsResolver::from_config(config)),
            interceptor: Arc::new(LoggingInterceptor::from_config(&config.logging, sink)),
            explicit: None,
            id_header,
        }
    }

    /// Same resolver and sink, with `over` applied on top for every exchange.
    pub fn with_override(&self, over: ExchangeOverride) -> Self {
        Self {
            explicit: Some(Arc::new(over)),
            ..self.clone()
        }
    }
}

/// Middleware that logs every exchange passing through it.
///
/// Mount with `axum::middleware::from_fn_with_state(state, log_exchange)`.
/// Bodies are read only up to each side's capture limit; the rest streams
/// through untouched.
pub async fn log_exchange(State(state): State<HushState>, request: Request, next: Next) -> Response {
    let received_at = Instant::now();
    let settings = state.resolver.resolve_exchange(
        request.method().as_str(),
        request.uri().path(),
        state.explicit.as_deref(),
    );
    if !settings.is_active() {
        return next.run(request).await;
    }

    let id = new_exchange_id();
    let (parts, body) = request.into_parts();
    let (body, captured) = if settings.request.wants_body() {
        match capture_prefix(body, settings.request.capture_limit()).await {
            Ok(read) => read,
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to read request body");
                return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
            }
        }
    } else {
        (body, BodyCapture::NotCaptured)
    };
    let request = BufferedRequest {
        request: Request::from_parts(parts, body),
        body: captured,
        received_at,
    };

    let response_limit = settings
        .response
        .wants_body()
        .then(|| settings.response.capture_limit());
    let outcome = state
        .interceptor
        .intercept(settings, id.clone(), request, |rq| async move {
            let response = next.run(rq.request).await;
            Ok::<_, Infallible>(BufferedResponse::capture(response, response_limit).await)
        })
        .await;

    let mut response = match outcome {
        Ok(buffered) => buffered.response,
        Err(never) => match never {},
    };
    if let Some(name) = &state.id_header {
        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(name.clone(), value);
        }
    }
    response
}

fn header_list(headers: &HeaderMap) -> HeaderList {
    headers
        .keys()
        .map(|name| {
            let values = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (name.as_str().to_string(), values)
        })
        .collect()
}

// ── Capture adapters ──────────────────────────────────────────

/// An axum request with whatever part of its body was captured.
pub struct BufferedRequest {
    request: Request,
    body: BodyCapture,
    received_at: Instant,
}

impl RequestCapture for BufferedRequest {
    fn method(&self) -> &str {
        self.request.method().as_str()
    }

    fn path(&self) -> &str {
        self.request.uri().path()
    }

    fn query(&self) -> Option<&str> {
        self.request.uri().query()
    }

    fn headers(&self) -> HeaderList {
        header_list(self.request.headers())
    }

    fn body(&self) -> BodyCapture {
        self.body.clone()
    }

    fn received_at(&self) -> Option<Instant> {
        Some(self.received_at)
    }
}

/// A handler response with whatever part of its body was captured.
pub struct BufferedResponse {
    response: Response,
    body: BodyCapture,
}

impl BufferedResponse {
    /// Capture up to `limit` bytes of the body; `None` leaves it unread.
    /// Streaming bodies are never read ahead of the client.
    async fn capture(response: Response, limit: Option<usize>) -> Self {
        let Some(limit) = limit else {
            return Self {
                response,
                body: BodyCapture::NotCaptured,
            };
        };
        let (parts, body) = response.into_parts();
        if is_streaming(&parts.headers, &body) {
            debug!("Streaming response body, not captured");
            return Self {
                response: Response::from_parts(parts, body),
                body: BodyCapture::Unavailable("STREAMING"),
            };
        }
        match capture_prefix(body, limit).await {
            Ok((body, captured)) => Self {
                response: Response::from_parts(parts, body),
                body: captured,
            },
            Err(e) => {
                warn!(error = %e, "Failed to read response body");
                Self {
                    response: Response::from_parts(parts, Body::empty()),
                    body: BodyCapture::Unavailable("UNAVAILABLE"),
                }
            }
        }
    }
}

impl ResponseCapture for BufferedResponse {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn headers(&self) -> HeaderList {
        header_list(self.response.headers())
    }

    fn body(&self) -> BodyCapture {
        self.body.clone()
    }
}

use hush_core::{BodyCapture, HeaderList, LogSettings, RequestContext, ResponseContext};
use std::time::Instant;

/// Lifecycle of one logged exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangePhase {
    /// Settings resolved, nothing captured yet.
    Start,
    /// Request snapshot taken; the timer is running.
    RequestCaptured,
    /// Control handed to the downstream handler.
    HandlerInvoked,
    /// Outcome snapshot taken; the timer is stopped.
    ResponseCaptured,
    /// Records built and handed to the sink.
    Emitted,
}

impl ExchangePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangePhase::Start => "start",
            ExchangePhase::RequestCaptured => "request_captured",
            ExchangePhase::HandlerInvoked => "handler_invoked",
            ExchangePhase::ResponseCaptured => "response_captured",
            ExchangePhase::Emitted => "emitted",
        }
    }
}

impl std::fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Capture interfaces ────────────────────────────────────────

/// Read access to an inbound request, implemented by the framework adapter.
pub trait RequestCapture {
    fn method(&self) -> &str;
    fn path(&self) -> &str;
    fn query(&self) -> Option<&str>;
    fn headers(&self) -> HeaderList;
    /// What the adapter captured of the body; only asked for when the
    /// request side logs bodies.
    fn body(&self) -> BodyCapture;
    /// When the request reached the adapter. Defaults to the moment of the
    /// snapshot.
    fn received_at(&self) -> Option<Instant> {
        None
    }
}

/// Read access to a handler's successful response.
pub trait ResponseCapture {
    fn status(&self) -> u16;
    fn headers(&self) -> HeaderList;
    /// What the adapter captured of the body.
    fn body(&self) -> BodyCapture;
}

/// Status information carried by a handler error, if any.
pub trait FailureCapture {
    fn status(&self) -> Option<u16> {
        None
    }
}

impl FailureCapture for std::convert::Infallible {}

/// Snapshot a request. Headers and body are only read when the request side
/// will log them; method and target are always kept for the response record.
pub(crate) fn snapshot_request<R: RequestCapture>(request: &R, settings: &LogSettings) -> RequestContext {
    let target = match request.query() {
        Some(q) => format!("{}?{}", request.path(), q),
        None => request.path().to_string(),
    };
    let mut ctx = RequestContext::new(request.method(), &target);
    if let Some(received_at) = request.received_at() {
        ctx.received_at = received_at;
    }
    if settings.is_enabled() && settings.headers_included {
        ctx.headers = request.headers();
    } else if settings.wants_body() {
        // content-type still decides the masking strategy
        ctx.headers = request
            .headers()
            .into_iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .collect();
    }
    if settings.wants_body() {
        ctx.body = request.body();
    }
    ctx
}

pub(crate) fn snapshot_response<R: ResponseCapture>(response: &R, settings: &LogSettings) -> ResponseContext {
    let mut ctx = ResponseContext::new(response.status());
    if settings.is_enabled() {
        ctx.headers = response.headers();
    }
    if settings.wants_body() {
        ctx.body = response.body();
    }
    ctx
}

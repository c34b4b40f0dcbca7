use crate::settings::BodyType;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Ordered header list. Names keep their original case; a name may carry
/// several values.
pub type HeaderList = Vec<(String, Vec<String>)>;

/// Which side of an exchange a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Request => "request",
            Direction::Response => "response",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Direction::Request => "Request",
            Direction::Response => "Response",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the adapter managed to capture of a payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BodyCapture {
    /// Not read, because the resolved settings exclude bodies.
    #[default]
    NotCaptured,
    Captured(Bytes),
    /// Only the first bytes were kept. `total` is the full length when the
    /// adapter knows it.
    Truncated { prefix: Bytes, total: Option<usize> },
    /// The body could not be read (streaming, failed handler, cancellation).
    Unavailable(&'static str),
}

impl BodyCapture {
    /// Whatever bytes were captured, whole or partial.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            BodyCapture::Captured(b) => Some(b),
            BodyCapture::Truncated { prefix, .. } => Some(prefix),
            _ => None,
        }
    }
}

/// Case-insensitive header lookup, returning the first value.
pub fn header_value<'a>(headers: &'a HeaderList, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.first())
        .map(|s| s.as_str())
}

/// Snapshot of an inbound request, as seen by the logging layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderList,
    pub body: BodyCapture,
    pub received_at: Instant,
    /// When the snapshot was taken; the request record's timing ends here.
    pub captured_at: Instant,
}

impl RequestContext {
    /// Build from a method and a request target such as `/a/b?x=1`.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (target.to_string(), None),
        };
        let now = Instant::now();
        Self {
            method: method.into(),
            path,
            query,
            headers: Vec::new(),
            body: BodyCapture::NotCaptured,
            received_at: now,
            captured_at: now,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == name) {
            Some((_, values)) => values.push(value),
            None => self.headers.push((name, vec![value])),
        }
        self
    }

    pub fn with_headers(mut self, headers: HeaderList) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = BodyCapture::Captured(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body_type(&self) -> BodyType {
        BodyType::from_content_type(self.content_type())
    }

    /// Time from arrival until the request was captured.
    pub fn capture_took(&self) -> Duration {
        self.captured_at.saturating_duration_since(self.received_at)
    }

    /// Path plus query, as it appeared on the wire.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}

/// Snapshot of the outcome of an exchange.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// `None` when the exchange ended without a status (cancellation).
    pub status: Option<u16>,
    pub headers: HeaderList,
    pub body: BodyCapture,
    pub completed_at: Instant,
}

impl ResponseContext {
    pub fn new(status: u16) -> Self {
        Self {
            status: Some(status),
            headers: Vec::new(),
            body: BodyCapture::NotCaptured,
            completed_at: Instant::now(),
        }
    }

    /// Outcome of a handler that returned an error instead of a response.
    pub fn failed(status: Option<u16>) -> Self {
        Self {
            status: Some(status.unwrap_or(500)),
            headers: Vec::new(),
            body: BodyCapture::Unavailable("UNAVAILABLE"),
            completed_at: Instant::now(),
        }
    }

    /// Outcome of an exchange abandoned before the handler finished.
    pub fn cancelled() -> Self {
        Self {
            status: None,
            headers: Vec::new(),
            body: BodyCapture::Unavailable("CANCELLED"),
            completed_at: Instant::now(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderList) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = BodyCapture::Captured(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body_type(&self) -> BodyType {
        BodyType::from_content_type(self.content_type())
    }

    /// Time from request arrival to this outcome.
    pub fn elapsed_since(&self, request: &RequestContext) -> Duration {
        self.completed_at.saturating_duration_since(request.received_at)
    }
}

use crate::body_masker::{render_body, render_body_prefix};
use crate::header_masker::{mask_headers, mask_uri};
use chrono::{DateTime, Utc};
use hush_core::{
    BodyCapture, Direction, HeaderList, HushError, LogLevel, LogSettings, RecordFormat,
    RequestContext, ResponseContext,
};
use serde::{Serialize, Serializer};
use std::fmt::Write as _;
use std::time::Duration;

/// One emittable record: the request or the response side of an exchange.
///
/// Optional fields that the side's settings exclude are `None` and are left
/// out of the JSON rendering entirely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub direction: Direction,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub took_ms: Option<u64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_headers"
    )]
    pub headers: Option<HeaderList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

fn serialize_headers<S: Serializer>(headers: &Option<HeaderList>, s: S) -> Result<S::Ok, S::Error> {
    match headers {
        Some(h) => s.collect_map(h.iter().map(|(k, v)| (k, v))),
        None => s.serialize_none(),
    }
}

// ── Builder ───────────────────────────────────────────────────

/// Builds records for one side from that side's resolved settings.
pub struct LogRecordBuilder<'a> {
    settings: &'a LogSettings,
}

impl<'a> LogRecordBuilder<'a> {
    pub fn new(settings: &'a LogSettings) -> Self {
        Self { settings }
    }

    fn base(&self, direction: Direction, id: &str) -> LogRecord {
        LogRecord {
            direction,
            level: self.settings.level,
            timestamp: Utc::now(),
            id: self.settings.id_included.then(|| id.to_string()),
            method: None,
            uri: None,
            status: None,
            took_ms: None,
            headers: None,
            body: None,
        }
    }

    fn headers(&self, headers: &HeaderList) -> Option<HeaderList> {
        self.settings
            .headers_included
            .then(|| mask_headers(headers, &self.settings.mask.headers))
    }

    fn body(&self, body: &BodyCapture, content_type: Option<&str>) -> Option<String> {
        if !self.settings.body_included {
            return None;
        }
        match body {
            BodyCapture::Captured(bytes) => Some(render_body(bytes, content_type, self.settings)),
            BodyCapture::Truncated { prefix, total } => {
                Some(render_body_prefix(prefix, *total, content_type, self.settings))
            }
            BodyCapture::Unavailable(reason) => Some(format!("<{reason}>")),
            BodyCapture::NotCaptured => None,
        }
    }

    fn uri(&self, request: &RequestContext) -> String {
        mask_uri(
            &request.path,
            request.query.as_deref(),
            &self.settings.mask.query_parameters,
        )
    }

    /// Record for the inbound request.
    pub fn request(&self, id: &str, request: &RequestContext) -> LogRecord {
        let mut record = self.base(Direction::Request, id);
        if self.settings.uri_included {
            record.method = Some(request.method.clone());
            record.uri = Some(self.uri(request));
        }
        if self.settings.took_time_included {
            record.took_ms = Some(request.capture_took().as_millis() as u64);
        }
        record.headers = self.headers(&request.headers);
        record.body = self.body(&request.body, request.content_type());
        record
    }

    /// Record for the outcome. `elapsed` runs from request arrival to the
    /// response being captured.
    pub fn response(
        &self,
        id: &str,
        request: &RequestContext,
        response: &ResponseContext,
        elapsed: Duration,
    ) -> LogRecord {
        let mut record = self.base(Direction::Response, id);
        if self.settings.uri_included {
            record.method = Some(request.method.clone());
            record.uri = Some(self.uri(request));
            record.status = response.status;
        }
        if self.settings.took_time_included {
            record.took_ms = Some(elapsed.as_millis() as u64);
        }
        record.headers = self.headers(&response.headers);
        record.body = self.body(&response.body, response.content_type());
        record
    }
}

// ── Rendering ─────────────────────────────────────────────────

const BANNER_FILL: &str = "===========================";

impl LogRecord {
    /// Render in the configured format.
    pub fn render(&self, format: RecordFormat, name: &str, column_width: usize) -> Result<String, HushError> {
        match format {
            RecordFormat::Text => Ok(self.render_text(name, column_width)),
            RecordFormat::Json => self.render_json(),
        }
    }

    pub fn render_json(&self) -> Result<String, HushError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Multi-line block framed by `begin` / `end` banners. Continuation lines
    /// are indented to the value column.
    pub fn render_text(&self, name: &str, column_width: usize) -> String {
        let title = self.direction.title();
        let mut out = format!("{BANNER_FILL}{name} {title} begin{BANNER_FILL}\n");

        if let Some(id) = &self.id {
            push_line(&mut out, "ID", id, column_width);
        }
        if let Some(uri) = &self.uri {
            let method = self.method.as_deref().unwrap_or_default();
            let line = match self.status {
                Some(status) => format!("{status} {method} {uri}"),
                None if self.direction == Direction::Response => format!("- {method} {uri}"),
                None => format!("{method} {uri}"),
            };
            push_line(&mut out, "URI", &line, column_width);
        }
        if let Some(took) = self.took_ms {
            push_line(&mut out, "Took", &format!("{took} ms"), column_width);
        }
        if let Some(headers) = &self.headers {
            let joined = headers
                .iter()
                .map(|(k, v)| format!("{k}:{}", v.join(",")))
                .collect::<Vec<_>>()
                .join("\n");
            push_line(&mut out, "Headers", &joined, column_width);
        }
        if let Some(body) = &self.body {
            push_line(&mut out, "Body", body, column_width);
        }

        let _ = write!(out, "{BANNER_FILL}{name} {title} end  {BANNER_FILL}");
        out
    }
}

fn push_line(out: &mut String, label: &str, value: &str, column_width: usize) {
    let label = format!("={label}");
    let indent = " ".repeat(column_width + 2);
    let value = value.replace('\n', &format!("\n{indent}"));
    let _ = writeln!(out, "{label:<column_width$}: {value}");
}

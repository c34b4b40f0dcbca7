use crate::exchange::{
    ExchangePhase, FailureCapture, RequestCapture, ResponseCapture, snapshot_request,
    snapshot_response,
};
use hush_core::{ExchangeSettings, LoggingConfig, RecordFormat, RequestContext, ResponseContext};
use hush_observability::log_record::{LogRecord, LogRecordBuilder};
use hush_observability::sink::LogSink;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fresh id correlating the request and response records of one exchange.
pub fn new_exchange_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Wraps a handler invocation and logs both sides of the exchange.
///
/// Logging never changes the outcome: the handler's result is returned as
/// is, and any failure while masking, rendering or emitting is reported with
/// `warn!` and dropped.
pub struct LoggingInterceptor {
    name: String,
    format: RecordFormat,
    column_width: usize,
    sink: Arc<dyn LogSink>,
}

impl LoggingInterceptor {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            name: "HTTP".to_string(),
            format: RecordFormat::Text,
            column_width: 14,
            sink,
        }
    }

    pub fn from_config(config: &LoggingConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            name: config.name.clone(),
            format: config.format,
            column_width: config.new_line_column_symbols,
            sink,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_column_width(mut self, width: usize) -> Self {
        self.column_width = width;
        self
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Run `next` with `request`, logging the exchange under `settings`.
    ///
    /// If the returned future is dropped before the handler finishes (client
    /// gone, timeout, panic) the request record and a partial response
    /// record are still emitted.
    pub async fn intercept<Req, Res, E, F, Fut>(
        &self,
        settings: ExchangeSettings,
        id: String,
        request: Req,
        next: F,
    ) -> Result<Res, E>
    where
        Req: RequestCapture,
        Res: ResponseCapture,
        E: FailureCapture,
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Res, E>>,
    {
        if !settings.is_active() {
            return next(request).await;
        }

        let mut exchange = Exchange::new(self, settings, id);
        exchange.capture_request(&request);
        exchange.phase = ExchangePhase::HandlerInvoked;

        let result = next(request).await;

        match &result {
            Ok(response) => exchange.capture_response(response),
            Err(error) => exchange.capture_failure(error),
        }
        exchange.emit();
        result
    }

    /// Build, render and emit the records of a finished exchange.
    fn emit_exchange(
        &self,
        settings: &ExchangeSettings,
        id: &str,
        request: &RequestContext,
        response: &ResponseContext,
    ) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if settings.request.is_enabled() {
                let record = LogRecordBuilder::new(&settings.request).request(id, request);
                self.write(&record);
            }
            if settings.response.is_enabled() {
                let elapsed = response.elapsed_since(request);
                let record =
                    LogRecordBuilder::new(&settings.response).response(id, request, response, elapsed);
                self.write(&record);
            }
        }));

        if let Err(payload) = outcome {
            warn!(id = %id, panic = %panic_message(&*payload), "Exchange logging panicked, records dropped");
        }
    }

    fn write(&self, record: &LogRecord) {
        let line = match record.render(self.format, &self.name, self.column_width) {
            Ok(line) => line,
            Err(e) => {
                warn!(direction = %record.direction, kind = e.kind(), error = %e, "Failed to render exchange record");
                return;
            }
        };
        if let Err(e) = self.sink.emit(record, &line) {
            warn!(direction = %record.direction, kind = e.kind(), error = %e, "Log sink failed, writing record to stderr");
            eprintln!("{line}");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Per-exchange state ────────────────────────────────────────

/// State of one exchange. Emits on drop if the exchange never reached
/// [`ExchangePhase::Emitted`].
struct Exchange<'a> {
    interceptor: &'a LoggingInterceptor,
    settings: ExchangeSettings,
    id: String,
    phase: ExchangePhase,
    request: Option<RequestContext>,
    response: Option<ResponseContext>,
}

impl<'a> Exchange<'a> {
    fn new(interceptor: &'a LoggingInterceptor, settings: ExchangeSettings, id: String) -> Self {
        Self {
            interceptor,
            settings,
            id,
            phase: ExchangePhase::Start,
            request: None,
            response: None,
        }
    }

    fn capture_request<R: RequestCapture>(&mut self, request: &R) {
        self.request = Some(snapshot_request(request, &self.settings.request));
        self.phase = ExchangePhase::RequestCaptured;
    }

    fn capture_response<R: ResponseCapture>(&mut self, response: &R) {
        self.response = Some(snapshot_response(response, &self.settings.response));
        self.phase = ExchangePhase::ResponseCaptured;
    }

    fn capture_failure<E: FailureCapture>(&mut self, error: &E) {
        let status = error.status();
        debug!(id = %self.id, status = ?status, "Handler returned an error");
        self.response = Some(ResponseContext::failed(status));
        self.phase = ExchangePhase::ResponseCaptured;
    }

    fn emit(&mut self) {
        let Some(request) = self.request.take() else {
            self.phase = ExchangePhase::Emitted;
            return;
        };
        let response = self.response.take().unwrap_or_else(ResponseContext::cancelled);
        self.interceptor
            .emit_exchange(&self.settings, &self.id, &request, &response);
        self.phase = ExchangePhase::Emitted;
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        if self.phase != ExchangePhase::Emitted {
            debug!(id = %self.id, phase = %self.phase, "Exchange ended before completion, emitting partial records");
            self.emit();
        }
    }
}

use crate::exchange::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Keys masked by default in query strings and JSON / form bodies.
pub const DEFAULT_MASK_KEYS: &[&str] = &[
    "Authorization",
    "authorization",
    "token",
    "secret",
    "password",
    "code",
];

/// Headers masked by default. Header matching is case-insensitive.
pub const DEFAULT_MASK_HEADERS: &[&str] = &["Authorization"];

// ── Levels ────────────────────────────────────────────────────

/// Level a side of an exchange is logged at. `Off` disables that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != LogLevel::Off
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(LogLevel::Off),
            "error" | "severe" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "fine" => Ok(LogLevel::Debug),
            "trace" | "finest" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

// ── Body types ────────────────────────────────────────────────

/// Encoding of a request/response payload, which decides the masking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    Json,
    Form,
    Multipart,
    Other,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::Json => "json",
            BodyType::Form => "form",
            BodyType::Multipart => "multipart",
            BodyType::Other => "other",
        }
    }

    /// Classify a `Content-Type` header value. Parameters such as `charset`
    /// are ignored; a missing header is `Other`.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(ct) = content_type else {
            return BodyType::Other;
        };
        let mime = ct
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            BodyType::Json
        } else if mime == "application/x-www-form-urlencoded" {
            BodyType::Form
        } else if mime.starts_with("multipart/") {
            BodyType::Multipart
        } else {
            BodyType::Other
        }
    }

    /// Body type whose mask keys apply. Multipart part names use the form keys.
    pub fn mask_key_source(&self) -> BodyType {
        match self {
            BodyType::Multipart => BodyType::Form,
            other => *other,
        }
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Mask settings ─────────────────────────────────────────────

/// What to mask on one side of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskSettings {
    /// Header names, compared case-insensitively.
    #[serde(default = "default_mask_headers")]
    pub headers: Vec<String>,
    /// Query parameter names, compared case-insensitively.
    #[serde(default = "default_mask_keys")]
    pub query_parameters: Vec<String>,
    /// Keys to mask inside each kind of body, compared exactly.
    #[serde(default = "default_body_keys")]
    pub body_keys: BTreeMap<BodyType, Vec<String>>,
}

fn default_mask_headers() -> Vec<String> {
    DEFAULT_MASK_HEADERS.iter().map(|s| s.to_string()).collect()
}

fn default_mask_keys() -> Vec<String> {
    DEFAULT_MASK_KEYS.iter().map(|s| s.to_string()).collect()
}

fn default_body_keys() -> BTreeMap<BodyType, Vec<String>> {
    BTreeMap::from([
        (BodyType::Json, default_mask_keys()),
        (BodyType::Form, default_mask_keys()),
    ])
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            headers: default_mask_headers(),
            query_parameters: default_mask_keys(),
            body_keys: default_body_keys(),
        }
    }
}

impl MaskSettings {
    /// Mask nothing at all.
    pub fn none() -> Self {
        Self {
            headers: Vec::new(),
            query_parameters: Vec::new(),
            body_keys: BTreeMap::new(),
        }
    }

    /// Keys to mask for a body of the given type.
    pub fn body_keys_for(&self, body_type: BodyType) -> &[String] {
        self.body_keys
            .get(&body_type.mask_key_source())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

// ── Log settings ──────────────────────────────────────────────

/// Resolved configuration for one side (request or response) of an exchange.
///
/// Built once per exchange by the resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default = "default_true")]
    pub id_included: bool,
    #[serde(default = "default_true")]
    pub uri_included: bool,
    #[serde(default = "default_true")]
    pub took_time_included: bool,
    #[serde(default = "default_true")]
    pub headers_included: bool,
    #[serde(default = "default_true")]
    pub body_included: bool,
    /// Bodies longer than this many bytes are truncated in the log only.
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Most bytes of one body held in memory for logging. The rest of the
    /// body is passed on without being captured.
    #[serde(default = "default_max_capture_size")]
    pub max_capture_size: usize,
    #[serde(default)]
    pub mask: MaskSettings,
}

fn default_true() -> bool {
    true
}

fn default_max_body_size() -> usize {
    usize::MAX
}

/// 1000 KiB.
pub const DEFAULT_MAX_CAPTURE_SIZE: usize = 1024 * 1000;

fn default_max_capture_size() -> usize {
    DEFAULT_MAX_CAPTURE_SIZE
}

impl LogSettings {
    /// Built-in request defaults. Request timing is off: it is always ~0.
    pub fn request_default() -> Self {
        Self {
            took_time_included: false,
            ..Self::response_default()
        }
    }

    /// Built-in response defaults.
    pub fn response_default() -> Self {
        Self {
            level: LogLevel::Info,
            id_included: true,
            uri_included: true,
            took_time_included: true,
            headers_included: true,
            body_included: true,
            max_body_size: default_max_body_size(),
            max_capture_size: default_max_capture_size(),
            mask: MaskSettings::default(),
        }
    }

    /// Built-in defaults for a side.
    pub fn default_for(direction: Direction) -> Self {
        match direction {
            Direction::Request => Self::request_default(),
            Direction::Response => Self::response_default(),
        }
    }

    /// Settings used when nothing at all was supplied: the side is not logged.
    pub fn disabled() -> Self {
        Self {
            level: LogLevel::Off,
            ..Self::response_default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.level.is_enabled()
    }

    /// Whether a body must be captured for this side.
    pub fn wants_body(&self) -> bool {
        self.is_enabled() && self.body_included
    }

    /// Bytes of a body worth reading for the log: what gets logged, capped
    /// by the capture limit.
    pub fn capture_limit(&self) -> usize {
        self.max_body_size.min(self.max_capture_size)
    }
}

// ── Overrides ─────────────────────────────────────────────────

/// Partial mask settings. Unset fields fall back to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskSettingsOverride {
    pub headers: Option<Vec<String>>,
    pub query_parameters: Option<Vec<String>>,
    /// Replaces the key list per body type; types not listed fall back.
    pub body_keys: BTreeMap<BodyType, Vec<String>>,
}

impl MaskSettingsOverride {
    pub fn layered_over(&self, lower: &MaskSettingsOverride) -> MaskSettingsOverride {
        let mut body_keys = lower.body_keys.clone();
        body_keys.extend(self.body_keys.iter().map(|(k, v)| (*k, v.clone())));
        MaskSettingsOverride {
            headers: self.headers.clone().or_else(|| lower.headers.clone()),
            query_parameters: self
                .query_parameters
                .clone()
                .or_else(|| lower.query_parameters.clone()),
            body_keys,
        }
    }

    pub fn apply_to(&self, base: &MaskSettings) -> MaskSettings {
        let mut body_keys = base.body_keys.clone();
        body_keys.extend(self.body_keys.iter().map(|(k, v)| (*k, v.clone())));
        MaskSettings {
            headers: self.headers.clone().unwrap_or_else(|| base.headers.clone()),
            query_parameters: self
                .query_parameters
                .clone()
                .unwrap_or_else(|| base.query_parameters.clone()),
            body_keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_none() && self.query_parameters.is_none() && self.body_keys.is_empty()
    }
}

/// Partial settings for one side, supplied by configuration or by the code
/// that mounts the middleware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettingsOverride {
    pub level: Option<LogLevel>,
    pub id_included: Option<bool>,
    pub uri_included: Option<bool>,
    pub took_time_included: Option<bool>,
    pub headers_included: Option<bool>,
    pub body_included: Option<bool>,
    pub max_body_size: Option<usize>,
    pub max_capture_size: Option<usize>,
    pub mask: MaskSettingsOverride,
}

impl LogSettingsOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn id_included(mut self, on: bool) -> Self {
        self.id_included = Some(on);
        self
    }

    pub fn uri_included(mut self, on: bool) -> Self {
        self.uri_included = Some(on);
        self
    }

    pub fn took_time_included(mut self, on: bool) -> Self {
        self.took_time_included = Some(on);
        self
    }

    pub fn headers_included(mut self, on: bool) -> Self {
        self.headers_included = Some(on);
        self
    }

    pub fn body_included(mut self, on: bool) -> Self {
        self.body_included = Some(on);
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = Some(size);
        self
    }

    pub fn max_capture_size(mut self, size: usize) -> Self {
        self.max_capture_size = Some(size);
        self
    }

    pub fn mask_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask.headers = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn mask_query_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask.query_parameters = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn mask_body_keys<I, S>(mut self, body_type: BodyType, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask
            .body_keys
            .insert(body_type, keys.into_iter().map(Into::into).collect());
        self
    }

    /// Field-by-field merge: values set here win, unset ones come from `lower`.
    pub fn layered_over(&self, lower: &LogSettingsOverride) -> LogSettingsOverride {
        LogSettingsOverride {
            level: self.level.or(lower.level),
            id_included: self.id_included.or(lower.id_included),
            uri_included: self.uri_included.or(lower.uri_included),
            took_time_included: self.took_time_included.or(lower.took_time_included),
            headers_included: self.headers_included.or(lower.headers_included),
            body_included: self.body_included.or(lower.body_included),
            max_body_size: self.max_body_size.or(lower.max_body_size),
            max_capture_size: self.max_capture_size.or(lower.max_capture_size),
            mask: self.mask.layered_over(&lower.mask),
        }
    }

    /// Produce full settings from `base` with every set field replaced.
    pub fn apply_to(&self, base: &LogSettings) -> LogSettings {
        LogSettings {
            level: self.level.unwrap_or(base.level),
            id_included: self.id_included.unwrap_or(base.id_included),
            uri_included: self.uri_included.unwrap_or(base.uri_included),
            took_time_included: self.took_time_included.unwrap_or(base.took_time_included),
            headers_included: self.headers_included.unwrap_or(base.headers_included),
            body_included: self.body_included.unwrap_or(base.body_included),
            max_body_size: self.max_body_size.unwrap_or(base.max_body_size),
            max_capture_size: self.max_capture_size.unwrap_or(base.max_capture_size),
            mask: self.mask.apply_to(&base.mask),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == LogSettingsOverride::default()
    }
}

/// Overrides for a whole exchange: both sides plus exchange-wide switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeOverride {
    /// `Some(false)` bypasses logging for the exchange entirely.
    pub enabled: Option<bool>,
    /// Applies to a side whose own level is unset in the same layer.
    pub level: Option<LogLevel>,
    pub request: LogSettingsOverride,
    pub response: LogSettingsOverride,
}

impl ExchangeOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override that turns logging off for the exchange.
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ..Self::default()
        }
    }

    pub fn enabled(mut self, on: bool) -> Self {
        self.enabled = Some(on);
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn request(mut self, request: LogSettingsOverride) -> Self {
        self.request = request;
        self
    }

    pub fn response(mut self, response: LogSettingsOverride) -> Self {
        self.response = response;
        self
    }

    /// Merge with `lower`. Each layer's exchange-wide level is folded into
    /// its own sides first, so any level set in the upper layer beats every
    /// level of the lower one.
    pub fn layered_over(&self, lower: &ExchangeOverride) -> ExchangeOverride {
        ExchangeOverride {
            enabled: self.enabled.or(lower.enabled),
            level: self.level.or(lower.level),
            request: self
                .side(Direction::Request)
                .layered_over(&lower.side(Direction::Request)),
            response: self
                .side(Direction::Response)
                .layered_over(&lower.side(Direction::Response)),
        }
    }

    /// The effective override for one side, with the exchange-wide level
    /// filling an unset side level.
    pub fn side(&self, direction: Direction) -> LogSettingsOverride {
        let mut side = match direction {
            Direction::Request => self.request.clone(),
            Direction::Response => self.response.clone(),
        };
        side.level = side.level.or(self.level);
        side
    }
}

/// Resolved settings for both sides of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeSettings {
    pub enabled: bool,
    pub request: LogSettings,
    pub response: LogSettings,
}

impl ExchangeSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            request: LogSettings::disabled(),
            response: LogSettings::disabled(),
        }
    }

    pub fn side(&self, direction: Direction) -> &LogSettings {
        match direction {
            Direction::Request => &self.request,
            Direction::Response => &self.response,
        }
    }

    /// True when at least one side will produce a record.
    pub fn is_active(&self) -> bool {
        self.enabled && (self.request.is_enabled() || self.response.is_enabled())
    }
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            request: LogSettings::request_default(),
            response: LogSettings::response_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_common_aliases() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("severe".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!(" off ".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
        let level: LogLevel = serde_json::from_str("\"trace\"").unwrap();
        assert_eq!(level, LogLevel::Trace);
    }

    #[test]
    fn body_type_from_content_type() {
        assert_eq!(BodyType::from_content_type(Some("application/json")), BodyType::Json);
        assert_eq!(
            BodyType::from_content_type(Some("application/problem+json; charset=utf-8")),
            BodyType::Json
        );
        assert_eq!(
            BodyType::from_content_type(Some("Application/X-WWW-Form-Urlencoded")),
            BodyType::Form
        );
        assert_eq!(
            BodyType::from_content_type(Some("multipart/form-data; boundary=xyz")),
            BodyType::Multipart
        );
        assert_eq!(BodyType::from_content_type(Some("text/plain")), BodyType::Other);
        assert_eq!(BodyType::from_content_type(None), BodyType::Other);
    }

    #[test]
    fn default_mask_settings_cover_json_and_form() {
        let mask = MaskSettings::default();
        assert_eq!(mask.headers, vec!["Authorization".to_string()]);
        assert!(mask.body_keys_for(BodyType::Json).contains(&"password".to_string()));
        assert!(mask.body_keys_for(BodyType::Form).contains(&"token".to_string()));
        // multipart part names use the form keys
        assert_eq!(
            mask.body_keys_for(BodyType::Multipart),
            mask.body_keys_for(BodyType::Form)
        );
        assert!(mask.body_keys_for(BodyType::Other).is_empty());
    }

    #[test]
    fn request_default_omits_took_time() {
        let rq = LogSettings::request_default();
        let rs = LogSettings::response_default();
        assert!(!rq.took_time_included);
        assert!(rs.took_time_included);
        assert_eq!(rq.level, LogLevel::Info);
        assert_eq!(rq.max_body_size, usize::MAX);
    }

    #[test]
    fn override_applies_field_by_field() {
        let base = LogSettings::response_default();
        let over = LogSettingsOverride::new()
            .body_included(false)
            .max_body_size(10)
            .mask_body_keys(BodyType::Json, ["pin"]);
        let resolved = over.apply_to(&base);
        assert!(!resolved.body_included);
        assert_eq!(resolved.max_body_size, 10);
        assert!(resolved.headers_included);
        assert_eq!(resolved.mask.body_keys[&BodyType::Json], vec!["pin".to_string()]);
        // form keys untouched
        assert_eq!(resolved.mask.body_keys[&BodyType::Form], base.mask.body_keys[&BodyType::Form]);
        assert_eq!(resolved.mask.headers, base.mask.headers);
    }

    #[test]
    fn layered_override_prefers_upper() {
        let lower = LogSettingsOverride::new().level(LogLevel::Debug).body_included(false);
        let upper = LogSettingsOverride::new().body_included(true);
        let merged = upper.layered_over(&lower);
        assert_eq!(merged.level, Some(LogLevel::Debug));
        assert_eq!(merged.body_included, Some(true));
    }

    #[test]
    fn exchange_level_fills_unset_side_level() {
        let over = ExchangeOverride::new()
            .level(LogLevel::Warn)
            .request(LogSettingsOverride::new().level(LogLevel::Error));
        assert_eq!(over.side(Direction::Request).level, Some(LogLevel::Error));
        assert_eq!(over.side(Direction::Response).level, Some(LogLevel::Warn));
    }

    #[test]
    fn upper_exchange_level_beats_lower_side_level() {
        let lower = ExchangeOverride::new().request(LogSettingsOverride::new().level(LogLevel::Info));
        let upper = ExchangeOverride::new().level(LogLevel::Off);
        let merged = upper.layered_over(&lower);
        assert_eq!(merged.side(Direction::Request).level, Some(LogLevel::Off));
        assert_eq!(merged.side(Direction::Response).level, Some(LogLevel::Off));
    }

    #[test]
    fn capture_limit_is_the_smaller_bound() {
        let mut settings = LogSettings::response_default();
        assert_eq!(settings.capture_limit(), DEFAULT_MAX_CAPTURE_SIZE);
        settings.max_body_size = 10;
        assert_eq!(settings.capture_limit(), 10);
        let capped = LogSettingsOverride::new().max_capture_size(4).apply_to(&settings);
        assert_eq!(capped.capture_limit(), 4);
    }

    #[test]
    fn empty_override_detection() {
        assert!(LogSettingsOverride::new().is_empty());
        assert!(!LogSettingsOverride::new().mask_headers(["x"]).is_empty());
        assert!(MaskSettingsOverride::default().is_empty());
    }

    #[test]
    fn exchange_settings_activity() {
        assert!(ExchangeSettings::default().is_active());
        assert!(!ExchangeSettings::disabled().is_active());
        let mut only_response = ExchangeSettings::default();
        only_response.request.level = LogLevel::Off;
        assert!(only_response.is_active());
        assert!(!only_response.request.wants_body());
        assert!(only_response.response.wants_body());
    }
}

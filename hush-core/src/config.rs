use crate::error::HushError;
use crate::settings::{ExchangeOverride, LogLevel, LogSettingsOverride};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HushConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-route settings, matched on method and path.
    #[serde(default)]
    pub routes: Vec<RouteLogConfig>,
}

/// Demo server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

/// How a record is rendered before it reaches the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Multi-line, human-readable block.
    #[default]
    Text,
    /// One JSON object per record.
    Json,
}

/// Global logging settings: the lowest configurable layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Level for a side whose own level is not set.
    #[serde(default)]
    pub level: Option<LogLevel>,
    /// Logger name shown in text banners.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub format: RecordFormat,
    /// Response header carrying the exchange id. `null` disables it.
    #[serde(default = "default_id_header")]
    pub id_header: Option<String>,
    /// Label column width in text records.
    #[serde(default = "default_column_width")]
    pub new_line_column_symbols: usize,
    #[serde(default)]
    pub request: LogSettingsOverride,
    #[serde(default)]
    pub response: LogSettingsOverride,
}

/// Settings attached to a route pattern (matchit syntax, e.g. `/users/{id}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteLogConfig {
    pub path: String,
    /// Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub request: LogSettingsOverride,
    #[serde(default)]
    pub response: LogSettingsOverride,
}

// ── Defaults ──

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_true() -> bool {
    true
}
fn default_name() -> String {
    "HTTP".to_string()
}
fn default_id_header() -> Option<String> {
    Some("RQ_ID".to_string())
}
fn default_column_width() -> usize {
    14
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            name: default_name(),
            format: RecordFormat::Text,
            id_header: default_id_header(),
            new_line_column_symbols: default_column_width(),
            request: LogSettingsOverride::default(),
            response: LogSettingsOverride::default(),
        }
    }
}

impl LoggingConfig {
    /// The global layer, expressed as an override over the built-in defaults.
    pub fn as_override(&self) -> ExchangeOverride {
        ExchangeOverride {
            enabled: Some(self.enabled),
            level: self.level,
            request: self.request.clone(),
            response: self.response.clone(),
        }
    }
}

impl RouteLogConfig {
    pub fn as_override(&self) -> ExchangeOverride {
        ExchangeOverride {
            enabled: self.enabled,
            level: self.level,
            request: self.request.clone(),
            response: self.response.clone(),
        }
    }
}

impl HushConfig {
    /// Load from a YAML file, with `HUSH_` environment variables on top
    /// (`HUSH_LOGGING__NAME=api` sets `logging.name`).
    pub fn load(path: &Path) -> Result<Self, HushError> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("HUSH_").split("__"))
            .extract()
            .map_err(|e| HushError::Configuration(e.to_string()))
    }

    /// Parse a YAML document without consulting the environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, HushError> {
        Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .map_err(|e| HushError::Configuration(e.to_string()))
    }

    /// Like [`HushConfig::load`], but invalid configuration falls back to
    /// built-in defaults instead of failing.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid logging configuration, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::BodyType;
    use std::io::Write;

    #[test]
    fn defaults_match_builtin_values() {
        let cfg = HushConfig::default();
        assert_eq!(cfg.server.addr, "0.0.0.0:8080");
        assert!(cfg.logging.enabled);
        assert_eq!(cfg.logging.name, "HTTP");
        assert_eq!(cfg.logging.id_header.as_deref(), Some("RQ_ID"));
        assert_eq!(cfg.logging.new_line_column_symbols, 14);
        assert_eq!(cfg.logging.format, RecordFormat::Text);
        assert!(cfg.routes.is_empty());
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        let cfg = HushConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg.logging.name, "HTTP");
        assert!(cfg.logging.request.is_empty());
    }

    #[test]
    fn yaml_sets_sides_and_routes() {
        let yaml = r#"
logging:
  name: api
  format: json
  level: debug
  request:
    body_included: false
  response:
    max_body_size: 64
    mask:
      body_keys:
        json: ["pin"]
routes:
  - path: /health
    enabled: false
  - path: /users/{id}
    methods: [GET]
    response:
      level: warn
"#;
        let cfg = HushConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.logging.name, "api");
        assert_eq!(cfg.logging.format, RecordFormat::Json);
        assert_eq!(cfg.logging.level, Some(LogLevel::Debug));
        assert_eq!(cfg.logging.request.body_included, Some(false));
        assert_eq!(cfg.logging.response.max_body_size, Some(64));
        assert_eq!(
            cfg.logging.response.mask.body_keys[&BodyType::Json],
            vec!["pin".to_string()]
        );
        assert_eq!(cfg.routes.len(), 2);
        assert_eq!(cfg.routes[0].enabled, Some(false));
        assert_eq!(cfg.routes[1].methods, vec!["GET".to_string()]);
        assert_eq!(cfg.routes[1].response.level, Some(LogLevel::Warn));
    }

    #[test]
    fn null_id_header_disables_it() {
        let cfg = HushConfig::from_yaml_str("logging:\n  id_header: null\n").unwrap();
        assert!(cfg.logging.id_header.is_none());
    }

    #[test]
    fn invalid_level_is_a_configuration_error() {
        let err = HushConfig::from_yaml_str("logging:\n  level: loud\n").unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn load_from_file() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "server:\n  addr: \"127.0.0.1:9999\"\nlogging:\n  name: files\n").unwrap();
        let cfg = HushConfig::load(tmpfile.path()).unwrap();
        assert_eq!(cfg.server.addr, "127.0.0.1:9999");
        assert_eq!(cfg.logging.name, "files");
        assert_eq!(cfg.logging.new_line_column_symbols, 14);
    }

    #[test]
    fn load_or_default_recovers_from_bad_file() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "logging:\n  enabled: [not, a, bool]\n").unwrap();
        let cfg = HushConfig::load_or_default(tmpfile.path());
        assert!(cfg.logging.enabled);
    }

    #[test]
    fn logging_config_as_override() {
        let mut logging = LoggingConfig::default();
        logging.enabled = false;
        logging.level = Some(LogLevel::Trace);
        let over = logging.as_override();
        assert_eq!(over.enabled, Some(false));
        assert_eq!(over.level, Some(LogLevel::Trace));
    }
}

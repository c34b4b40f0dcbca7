use crate::settings::BodyType;
use thiserror::Error;

/// Unified error type for Hush.
///
/// None of these are allowed to reach the caller of a logged endpoint: the
/// interceptor catches them at its boundary and reports them with `warn!`.
#[derive(Error, Debug)]
pub enum HushError {
    /// Invalid or missing settings. Always recovered by falling back to defaults.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A body could not be parsed for masking.
    #[error("Body parse error ({body_type}): {reason}")]
    BodyParse { body_type: BodyType, reason: String },

    /// The logging backend rejected a record.
    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl HushError {
    /// Short, stable name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            HushError::Configuration(_) => "configuration",
            HushError::BodyParse { .. } => "body_parse",
            HushError::Sink(_) => "sink",
            HushError::Serde(_) => "serde",
        }
    }

    pub fn body_parse(body_type: BodyType, reason: impl Into<String>) -> Self {
        HushError::BodyParse {
            body_type,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(HushError::Configuration("x".into()).kind(), "configuration");
        assert_eq!(HushError::body_parse(BodyType::Json, "eof").kind(), "body_parse");
        assert_eq!(HushError::Sink("down".into()).kind(), "sink");
    }

    #[test]
    fn body_parse_display_names_the_body_type() {
        let err = HushError::body_parse(BodyType::Form, "bad pair");
        assert_eq!(err.to_string(), "Body parse error (form): bad pair");
    }

    #[test]
    fn json_error_converts() {
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: HushError = json.into();
        assert_eq!(err.kind(), "serde");
        assert!(err.to_string().starts_with("Serialization error:"));
    }
}

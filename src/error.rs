use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    /// JSON parsing or serialization failed (snapshots, model files, oracle payloads)
    #[error("JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a file failed
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// YAML config could not be parsed
    #[error("YAML error ({context}): {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// CSS selector could not be parsed
    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    /// Model weights do not line up with the vocabulary or labels
    #[error("Model shape mismatch: {0}")]
    ModelShape(String),

    /// Oracle answered with something unusable
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// HTTP request to the oracle failed
    #[error("HTTP error ({context}): {source}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// A custom widget is missing a part its adapter relies on
    #[error("Adapter '{adapter}' could not find {part}")]
    MissingPart { adapter: String, part: String },
}

impl FormError {
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        FormError::Json {
            context: context.into(),
            source,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        FormError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn missing(adapter: &str, part: &str) -> Self {
        FormError::MissingPart {
            adapter: adapter.to_string(),
            part: part.to_string(),
        }
    }
}

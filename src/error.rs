//! Error types for the exemplar store

use std::fmt;

/// Result type alias for exemplar store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the exemplar store
#[derive(Debug)]
pub enum Error {
    /// Arrow-related errors
    Arrow(arrow::error::ArrowError),
    /// DataFusion errors
    DataFusion(datafusion::error::DataFusionError),
    /// IO errors
    Io(std::io::Error),
    /// Serialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// Malformed schema definition
    Schema(String),
    /// A row could not be built from the given labels
    Encoding(String),
    /// Engine rejected an insert or scan
    Engine(String),
    /// A scan result could not be interpreted
    Decoding(String),
    /// Matchers could not be translated into a filter
    QueryTranslation(String),
    /// Invalid client input (time parameters, selectors, payloads)
    BadData(String),
    /// The caller went away before the operation finished
    Canceled,
    /// Internal error
    Internal(String),
}

impl Error {
    /// Short, stable label used as a metric attribute.
    pub fn class(&self) -> &'static str {
        match self {
            Error::Arrow(_) => "arrow",
            Error::DataFusion(_) => "datafusion",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Schema(_) => "schema",
            Error::Encoding(_) => "encoding",
            Error::Engine(_) => "engine",
            Error::Decoding(_) => "decoding",
            Error::QueryTranslation(_) => "query_translation",
            Error::BadData(_) => "bad_data",
            Error::Canceled => "canceled",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether the error was caused by the client rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::BadData(_) | Error::QueryTranslation(_))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Arrow(e) => Some(e),
            Error::DataFusion(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Arrow(e) => write!(f, "Arrow error: {}", e),
            Error::DataFusion(e) => write!(f, "DataFusion error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Schema(msg) => write!(f, "Invalid schema: {}", msg),
            Error::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Error::Engine(msg) => write!(f, "Engine error: {}", msg),
            Error::Decoding(msg) => write!(f, "Decoding error: {}", msg),
            Error::QueryTranslation(msg) => write!(f, "Query translation error: {}", msg),
            Error::BadData(msg) => write!(f, "{}", msg),
            Error::Canceled => write!(f, "Operation canceled"),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<arrow::error::ArrowError> for Error {
    fn from(e: arrow::error::ArrowError) -> Self {
        Error::Arrow(e)
    }
}

impl From<datafusion::error::DataFusionError> for Error {
    fn from(e: datafusion::error::DataFusionError) -> Self {
        Error::DataFusion(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::BadData(format!("invalid protobuf payload: {}", e))
    }
}

impl From<snap::Error> for Error {
    fn from(e: snap::Error) -> Self {
        Error::BadData(format!("invalid snappy payload: {}", e))
    }
}

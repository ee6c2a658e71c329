//! Error types for the netzero collector.
//!
//! Errors are split by where they occur in a collection run so the
//! orchestrator can decide what to retry: configuration problems are fatal
//! before any network access, connection and fetch failures are retried with a
//! fixed delay, and parse problems degrade to an empty chunk.

use thiserror::Error;

/// Result type alias using our custom error types.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type that encompasses all application errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// Local database errors
    #[error("storage error")]
    Store(#[from] StoreError),

    /// Writing an export failed
    #[error("export error")]
    Export(#[from] ExportError),

    /// Generic errors that don't fit other categories
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration-related errors.
///
/// All of these are detected before a source touches the network and are
/// never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable parsing failed
    #[error("failed to parse environment variables: {0}")]
    EnvParse(String),

    /// The configuration file could not be read or parsed
    #[error("failed to load configuration file {path}: {message}")]
    File { path: String, message: String },

    /// No configuration table exists for a selected source
    #[error("'{0}' entry not in config")]
    MissingSource(String),

    /// A required field is absent from a source's table
    #[error("'{field}' field not in '{source_name}' entry")]
    MissingField { source_name: String, field: String },

    /// Configuration value is invalid
    #[error("invalid configuration value for {field}: {message}")]
    Invalid { field: String, message: String },

    /// The requested source name is not registered
    #[error("unknown source: {0}")]
    UnknownSource(String),
}

/// Failures while establishing or maintaining a session with a provider.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the credentials
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider returned an error status while logging in
    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    /// The login flow returned a page we could not navigate
    #[error("unexpected login page: {0}")]
    UnexpectedPage(#[from] ParseError),
}

/// Failures while fetching one chunk with an established session.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Rate limit exceeded
    #[error("rate limit exceeded (status 429): {0}")]
    RateLimit(String),

    /// A local input file could not be read
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// Payload parsing errors.
///
/// Adapters log these and yield zero readings for the affected chunk.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Element not found in HTML
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// Invalid CSS selector
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// Element is missing an expected attribute
    #[error("element '{selector}' has no attribute '{attribute}'")]
    MissingAttribute { selector: String, attribute: String },

    /// Failed to parse numeric value
    #[error("failed to parse number from '{text}': {message}")]
    NumberParse { text: String, message: String },

    /// Failed to parse date/time
    #[error("failed to parse date/time from '{text}': {message}")]
    DateTimeParse { text: String, message: String },

    /// JSON payload did not match the expected shape
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// XML payload could not be read
    #[error("malformed XML: {0}")]
    Xml(String),
}

/// Errors an adapter reports back to the orchestrator.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Establishing the session failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Fetching a chunk failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The provider no longer honours the session; it must be re-established
    #[error("session is no longer valid")]
    SessionExpired,
}

/// Local database errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite or connection-thread failure
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    /// A stored value could not be decoded
    #[error("failed to decode stored value '{value}': {message}")]
    Decode { value: String, message: String },
}

/// Errors writing an export.
#[derive(Error, Debug)]
pub enum ExportError {
    /// CSV serialisation failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading aggregates failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConfigError {
    /// Creates a new environment parse error.
    pub fn env_parse(err: impl std::fmt::Display) -> Self {
        Self::EnvParse(err.to_string())
    }

    /// Creates a new configuration file error.
    pub fn file(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::File {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Creates a new missing field error.
    pub fn missing_field(source_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            source_name: source_name.into(),
            field: field.into(),
        }
    }

    /// Creates a new invalid configuration error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ConnectionError {
    /// Creates a connection error from an HTTP status and response body.
    pub fn server_error(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthFailed(body),
            code => Self::ServerError {
                status: code,
                message: body,
            },
        }
    }
}

impl FetchError {
    /// Creates a fetch error from an HTTP status and response body.
    pub fn server_error(status: reqwest::StatusCode, body: String) -> Self {
        if status.as_u16() == 429 {
            Self::RateLimit(body)
        } else {
            Self::ServerError {
                status: status.as_u16(),
                message: body,
            }
        }
    }

    /// Creates an I/O error for a local input file.
    pub fn io(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl ParseError {
    /// Creates an element not found error.
    pub fn element_not_found(selector: impl Into<String>) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Creates an invalid selector error.
    pub fn invalid_selector(selector: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: err.to_string(),
        }
    }

    /// Creates a missing attribute error.
    pub fn missing_attribute(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }

    /// Creates a number parse error.
    pub fn number_parse(text: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::NumberParse {
            text: text.into(),
            message: err.to_string(),
        }
    }

    /// Creates a datetime parse error.
    pub fn datetime_parse(text: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::DateTimeParse {
            text: text.into(),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Creates a decode error.
    pub fn decode(value: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            value: value.into(),
            message: err.to_string(),
        }
    }
}

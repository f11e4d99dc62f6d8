use thiserror::Error;

/// Application-wide error types for jsontable.
#[derive(Error, Debug)]
pub enum AppError {
    /// The configured panel has no URL to fetch.
    #[error("Missing URL")]
    MissingUrl,

    /// URL could not be parsed, or uses a scheme other than http/https.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A single hop did not complete within the configured timeout (milliseconds).
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Redirect budget exhausted. Carries the last URL that answered with a redirect.
    #[error("Too many redirects. Last: {last_url}")]
    TooManyRedirects { last_url: String },

    /// Terminal HTTP status (outside 2xx, and not a followed redirect).
    #[error("HTTP {status}: {snippet}")]
    HttpStatus { status: u16, snippet: String },

    /// 2xx response whose body is not valid JSON.
    #[error("Failed to parse JSON: {0}")]
    InvalidJson(String),

    /// Response body exceeded the configured byte limit.
    #[error("Response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// Connection, TLS or protocol failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Nothing to tabulate: no document yet, or no array at the configured path.
    /// Carries the text shown in place of the table.
    #[error("{0}")]
    NoData(String),

    /// Table construction failed.
    #[error("Render error: {0}")]
    RenderError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if the failure happened on the wire rather than in the payload.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            AppError::Timeout(_) | AppError::Transport(_) | AppError::TooManyRedirects { .. }
        )
    }

    /// Short machine-readable tag, used in API error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingUrl => "missing_url",
            AppError::InvalidUrl(_) => "invalid_url",
            AppError::Timeout(_) => "timeout",
            AppError::TooManyRedirects { .. } => "too_many_redirects",
            AppError::HttpStatus { .. } => "http_status",
            AppError::InvalidJson(_) => "invalid_json",
            AppError::ResponseTooLarge { .. } => "response_too_large",
            AppError::Transport(_) => "transport_error",
            AppError::ConfigError(_) => "config_error",
            AppError::NoData(_) => "no_data",
            AppError::RenderError(_) => "render_error",
            AppError::SerializationError(_) => "serialization_error",
        }
    }
}

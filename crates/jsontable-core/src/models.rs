use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::AppError;

pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_REDIRECTS: u32 = 3;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// One logical GET of a JSON document, including its redirect chain.
///
/// Built once per poll tick (or per channel message) and never mutated
/// after it is handed to a [`Fetcher`](crate::traits::Fetcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Armed separately for every hop of the redirect chain.
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
    /// Disables certificate verification on https hops. Opt-in only.
    pub tls_insecure: bool,
    pub max_redirects: u32,
    pub max_body_bytes: usize,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            headers: BTreeMap::new(),
            tls_insecure: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_tls_insecure(mut self, insecure: bool) -> Self {
        self.tls_insecure = insecure;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Successful outcome of a fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedDocument {
    pub data: serde_json::Value,
    /// URL of the hop that produced the body.
    pub final_url: String,
    /// URLs that answered with a followed redirect, in order.
    pub redirects: Vec<String>,
}

/// Parse a hop URL, accepting only http and https.
pub fn parse_http_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw).map_err(|_| AppError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(AppError::InvalidUrl(raw.to_string())),
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Fetch channel messages
// ---------------------------------------------------------------------------

/// Options block of an inbound fetch message.
///
/// Lenient on input: wrongly typed numbers fall back to the defaults and
/// `tlsInsecure` accepts any truthy value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    #[serde(default, deserialize_with = "number_or_none")]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "truthy")]
    pub tls_insecure: bool,
    #[serde(default, deserialize_with = "number_or_none")]
    pub max_redirects: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "number_or_none")]
    pub max_body_bytes: Option<u64>,
}

/// Inbound request on the fetch channel: `{ id, url, options }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchMessage {
    /// Opaque correlation id, echoed back in the reply.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub options: FetchOptions,
}

impl FetchMessage {
    pub fn new(id: impl Into<String>, url: impl Into<String>, options: FetchOptions) -> Self {
        Self {
            id: Some(id.into()),
            url: Some(url.into()),
            options,
        }
    }

    /// Normalize into a [`FetchRequest`], applying defaults.
    ///
    /// Fails with [`AppError::MissingUrl`] before any network activity when
    /// the URL is absent or blank. A zero timeout is rejected the same way a
    /// zero `httpTimeout` is in the panel config.
    pub fn to_request(&self) -> Result<FetchRequest, AppError> {
        let url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(AppError::MissingUrl),
        };

        let opts = &self.options;
        if opts.timeout == Some(0) {
            return Err(AppError::ConfigError(
                "timeout must be at least 1 ms".to_string(),
            ));
        }
        let max_redirects = opts
            .max_redirects
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(DEFAULT_MAX_REDIRECTS);

        Ok(FetchRequest::new(url)
            .with_timeout(Duration::from_millis(
                opts.timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
            ))
            .with_headers(opts.headers.clone())
            .with_tls_insecure(opts.tls_insecure)
            .with_max_redirects(max_redirects)
            .with_max_body_bytes(
                opts.max_body_bytes
                    .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                    .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            ))
    }
}

/// Payload half of a reply: either the parsed document or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyOutcome {
    Data { data: serde_json::Value },
    Error { error: String },
}

/// Outbound reply on the fetch channel: `{ id, url, data }` or `{ id, url, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchReply {
    pub id: Option<String>,
    pub url: Option<String>,
    #[serde(flatten)]
    pub outcome: ReplyOutcome,
}

impl FetchReply {
    pub fn from_result(
        message: &FetchMessage,
        result: Result<FetchedDocument, AppError>,
    ) -> Self {
        let outcome = match result {
            Ok(doc) => ReplyOutcome::Data { data: doc.data },
            Err(e) => ReplyOutcome::Error {
                error: e.to_string(),
            },
        };
        Self {
            id: message.id.clone(),
            url: message.url.clone(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ReplyOutcome::Data { .. })
    }
}

fn number_or_none<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    })
}

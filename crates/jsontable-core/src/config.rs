use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{
    DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_MS, FetchMessage, FetchOptions,
    FetchRequest,
};
use crate::resolve::ArrayPath;

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_NO_DATA_TEXT: &str = "Json data is not of type array! Maybe the config arrayName is not used and should be, or is configured wrong.";

/// Configuration of a single table panel.
///
/// Field names follow the camelCase keys of the panel JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelConfig {
    pub url: String,
    pub array_name: Option<ArrayPath>,
    /// Per-hop timeout in milliseconds.
    pub http_timeout: u64,
    pub request_headers: BTreeMap<String, String>,
    /// Skip certificate verification for self-signed endpoints.
    pub tls_insecure: bool,
    pub max_redirects: u32,
    pub max_body_bytes: usize,
    /// Poll interval in milliseconds.
    pub update_interval: u64,
    pub no_data_text: String,
    pub keep_columns: Vec<String>,
    /// Wrap cell text in `<h1>`..`<h8>`; 0 disables.
    pub size: u8,
    pub try_format_date: bool,
    /// Raw markup placed in the table header.
    pub descriptive_row: Option<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            array_name: None,
            http_timeout: DEFAULT_TIMEOUT_MS,
            request_headers: BTreeMap::new(),
            tls_insecure: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            update_interval: DEFAULT_UPDATE_INTERVAL_MS,
            no_data_text: DEFAULT_NO_DATA_TEXT.to_string(),
            keep_columns: Vec::new(),
            size: 0,
            try_format_date: false,
            descriptive_row: None,
        }
    }
}

impl PanelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load a panel from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid panel config: {e}")))
    }

    /// Overlay environment variables on top of the current values.
    ///
    /// - `JSONTABLE_URL`
    /// - `JSONTABLE_ARRAY_NAME` (comma-separated for several candidates)
    /// - `JSONTABLE_HTTP_TIMEOUT_MS`
    /// - `JSONTABLE_TLS_INSECURE` (`1`/`true`)
    /// - `JSONTABLE_MAX_REDIRECTS`
    /// - `JSONTABLE_UPDATE_INTERVAL_MS`
    pub fn apply_env(self) -> Result<Self, AppError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(mut self, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("JSONTABLE_URL") {
            self.url = url;
        }
        if let Some(raw) = var("JSONTABLE_ARRAY_NAME") {
            self.array_name = parse_array_name(&raw);
        }
        if let Some(raw) = var("JSONTABLE_HTTP_TIMEOUT_MS") {
            self.http_timeout = parse_number("JSONTABLE_HTTP_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = var("JSONTABLE_TLS_INSECURE") {
            self.tls_insecure = matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(raw) = var("JSONTABLE_MAX_REDIRECTS") {
            self.max_redirects = parse_number("JSONTABLE_MAX_REDIRECTS", &raw)?;
        }
        if let Some(raw) = var("JSONTABLE_UPDATE_INTERVAL_MS") {
            self.update_interval = parse_number("JSONTABLE_UPDATE_INTERVAL_MS", &raw)?;
        }
        Ok(self)
    }

    /// Reject configurations that cannot produce a single fetch.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.url.trim().is_empty() {
            return Err(AppError::MissingUrl);
        }
        if self.http_timeout == 0 {
            return Err(AppError::ConfigError(
                "httpTimeout must be at least 1 ms".into(),
            ));
        }
        if self.update_interval == 0 {
            return Err(AppError::ConfigError(
                "updateInterval must be at least 1 ms".into(),
            ));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Some(self.http_timeout),
            headers: self.request_headers.clone(),
            tls_insecure: self.tls_insecure,
            max_redirects: Some(u64::from(self.max_redirects)),
            max_body_bytes: Some(self.max_body_bytes as u64),
        }
    }

    /// Channel message for one poll tick.
    pub fn fetch_message(&self, id: impl Into<String>) -> FetchMessage {
        FetchMessage::new(id, self.url.clone(), self.fetch_options())
    }

    pub fn fetch_request(&self) -> Result<FetchRequest, AppError> {
        self.fetch_message(String::new()).to_request()
    }
}

fn parse_array_name(raw: &str) -> Option<ArrayPath> {
    let parts: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next().map(ArrayPath::Single),
        _ => Some(ArrayPath::Candidates(parts)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a non-negative integer"))
    })
}

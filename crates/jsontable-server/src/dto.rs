use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jsontable_core::models::{FetchMessage, FetchOptions, FetchReply, ReplyOutcome};
use jsontable_core::present::{Cell, Table};

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PanelResponse {
    pub url: String,
    /// Records resolved from the latest document; null before the first
    /// success or when the configured path matches no array.
    pub rows: Option<Vec<serde_json::Value>>,
    pub data_hash: Option<String>,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CellResponse {
    pub key: String,
    pub text: String,
    pub classes: Vec<String>,
    pub color: Option<String>,
}

impl From<Cell> for CellResponse {
    fn from(cell: Cell) -> Self {
        Self {
            key: cell.key,
            text: cell.text,
            classes: cell.classes,
            color: cell.color,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TableResponse {
    pub header: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellResponse>>,
}

impl From<Table> for TableResponse {
    fn from(table: Table) -> Self {
        let columns = table.columns().into_iter().map(str::to_string).collect();
        Self {
            header: table.header,
            columns,
            rows: table
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(CellResponse::from).collect())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch channel
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct FetchMessageRequest {
    /// Correlation id, echoed back in the reply
    #[serde(default)]
    pub id: Option<String>,
    /// URL to fetch (http or https)
    #[serde(default)]
    pub url: Option<String>,
    /// `{ timeout, headers, tlsInsecure, maxRedirects, maxBodyBytes }`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub options: FetchOptions,
}

impl From<FetchMessageRequest> for FetchMessage {
    fn from(body: FetchMessageRequest) -> Self {
        Self {
            id: body.id,
            url: body.url,
            options: body.options,
        }
    }
}

/// `{ id, url, data }` on success, `{ id, url, error }` on failure.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct FetchReplyResponse {
    pub id: Option<String>,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<FetchReply> for FetchReplyResponse {
    fn from(reply: FetchReply) -> Self {
        let (data, error) = match reply.outcome {
            ReplyOutcome::Data { data } => (Some(data), None),
            ReplyOutcome::Error { error } => (None, Some(error)),
        };
        Self {
            id: reply.id,
            url: reply.url,
            data,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `awaiting`, `ok` or `failing`
    pub panel: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

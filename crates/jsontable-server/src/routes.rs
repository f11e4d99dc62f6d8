use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::middleware;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use chrono::Local;
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use jsontable_core::exchange;
use jsontable_core::models::FetchMessage;
use jsontable_core::present::{escape_html, render_panel, table_for_document};
use jsontable_core::resolve::resolve_items_from_config;

use crate::auth::require_admin_token;
use crate::dto::{
    FetchMessageRequest, FetchReplyResponse, HealthResponse, PanelResponse, TableResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Fetch channel messages are small; anything bigger is rejected with 413.
const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let channel = Router::new()
        .route("/v1/fetch", post(fetch))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_MESSAGE_BYTES));

    let public = Router::new()
        .route("/", get(index))
        .route("/v1/panel", get(panel))
        .route("/v1/panel/table", get(panel_table))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(channel).with_state(state)
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Rendered panel page", content_type = "text/html", body = String),
    ),
    tag = "panel"
)]
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let snapshot = state.panel.snapshot();
    let body = render_panel(
        snapshot.document.as_deref(),
        &state.config,
        Local::now().date_naive(),
    );
    // Reload at the poll cadence so the page follows the poller.
    let refresh_secs = state.config.update_interval().as_secs().max(1);

    Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"{refresh_secs}\">\
         <title>{title}</title></head><body>{body}</body></html>",
        title = escape_html(&state.config.url),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/panel",
    responses(
        (status = 200, description = "Panel snapshot and resolved records", body = PanelResponse),
    ),
    tag = "panel"
)]
pub async fn panel(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.panel.snapshot();
    let rows = snapshot
        .document
        .as_deref()
        .and_then(|doc| resolve_items_from_config(doc, state.config.array_name.as_ref()))
        .cloned();

    axum::Json(PanelResponse {
        url: state.config.url.clone(),
        rows,
        data_hash: snapshot.data_hash.clone(),
        last_error: snapshot.last_error.clone(),
        last_success_at: snapshot.last_success_at,
        last_attempt_at: snapshot.last_attempt_at,
        successes: snapshot.successes,
        failures: snapshot.failures,
    })
}

#[utoipa::path(
    get,
    path = "/v1/panel/table",
    responses(
        (status = 200, description = "Table built from the latest document", body = TableResponse),
        (status = 404, description = "No document yet, or no array at the configured path", body = crate::dto::ErrorResponse),
        (status = 422, description = "Records cannot be tabulated", body = crate::dto::ErrorResponse),
    ),
    tag = "panel"
)]
pub async fn panel_table(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.panel.snapshot();
    let table = table_for_document(
        snapshot.document.as_deref(),
        &state.config,
        Local::now().date_naive(),
    )?;

    Ok(axum::Json(TableResponse::from(table)))
}

// ---------------------------------------------------------------------------
// Fetch channel
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/fetch",
    request_body = FetchMessageRequest,
    responses(
        (status = 200, description = "Fetch reply, carrying either data or error", body = FetchReplyResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Fetch channel disabled"),
        (status = 413, description = "Message too large"),
    ),
    security(("bearer" = [])),
    tag = "fetch"
)]
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<FetchMessageRequest>,
) -> impl IntoResponse {
    let message = FetchMessage::from(body);
    let reply = exchange(&state.fetcher, &message).await;

    if reply.is_success() {
        tracing::info!(id = ?reply.id, url = ?reply.url, "Fetch channel reply sent");
    } else {
        tracing::warn!(id = ?reply.id, url = ?reply.url, "Fetch channel reply carries an error");
    }

    axum::Json(FetchReplyResponse::from(reply))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.panel.snapshot();
    let panel = if snapshot.last_error.is_some() {
        "failing"
    } else if snapshot.document.is_some() {
        "ok"
    } else {
        "awaiting"
    };

    axum::Json(HealthResponse {
        status: "healthy",
        panel,
    })
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use jsontable_core::error::AppError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `AppError`.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::MissingUrl | AppError::InvalidUrl(_) | AppError::SerializationError(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NoData(_) => StatusCode::NOT_FOUND,
            AppError::RenderError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::TooManyRedirects { .. }
            | AppError::HttpStatus { .. }
            | AppError::InvalidJson(_)
            | AppError::ResponseTooLarge { .. }
            | AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

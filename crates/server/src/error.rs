//! HTTP mapping for pipeline errors.
//!
//! Client mistakes become 400s; everything else is a request-processing
//! failure and becomes a 500. Both carry the error message as plain text.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use reducer_core::Error;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// An error that ends a request.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        if self.0.is_client_error() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "request processing failed");
        }
        (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], self.0.to_string()).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self(Error::InvalidInput(err.body_text()))
    }
}

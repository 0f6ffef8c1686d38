// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use doppel_core::DoppelError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`DoppelError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DoppelError);

impl From<DoppelError> for ApiError {
    fn from(err: DoppelError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DoppelError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DoppelError::Duplicate { .. } => StatusCode::CONFLICT,
            DoppelError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            DoppelError::UnknownChannel { .. } => StatusCode::NOT_FOUND,
            DoppelError::ChannelOffline { .. } | DoppelError::ChannelClosed { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

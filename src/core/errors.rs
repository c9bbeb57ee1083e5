use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Database connection not configured")]
    NotConfigured,

    #[error("Unknown action")]
    UnknownAction,

    /// The connection string could not be parsed or the server did not answer.
    #[error("{}", .0.kind)]
    Connection(#[source] mongodb::error::Error),

    /// Anything the driver reports while running a command. The message is
    /// forwarded to the client as-is.
    #[error("{}", .0.kind)]
    Driver(#[from] mongodb::error::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingFields
            | GatewayError::InvalidBody(_)
            | GatewayError::InvalidCommand(_)
            | GatewayError::NotConfigured
            | GatewayError::UnknownAction => StatusCode::BAD_REQUEST,
            GatewayError::Connection(_) | GatewayError::Driver(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "database command failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "rejected request");
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use placement_shared::Envelope;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotificationNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
        };

        let body: Envelope<()> = Envelope::failure(message);

        (status, axum::Json(body)).into_response()
    }
}

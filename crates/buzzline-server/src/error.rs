use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use buzzline_core::error::RoomError;

/// HTTP projection of the domain error taxonomy. Every error body is
/// `{"message": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub RoomError);

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        Self(err)
    }
}

fn status_for(err: &RoomError) -> StatusCode {
    match err {
        RoomError::RoomNotFound | RoomError::PlayerNotFound | RoomError::ShareCodeNotFound => {
            StatusCode::NOT_FOUND
        },
        RoomError::Forbidden => StatusCode::FORBIDDEN,
        RoomError::QuestionAlreadyInPlay
        | RoomError::NoActiveQuestion
        | RoomError::BuzzersAlreadyOpen
        | RoomError::BuzzNotAvailable
        | RoomError::AlreadyAttempted
        | RoomError::TurnRequired
        | RoomError::SlotAlreadyUsed => StatusCode::CONFLICT,
        RoomError::NoAnsweringPlayer
        | RoomError::InvalidShareCode
        | RoomError::Validation(_) => StatusCode::BAD_REQUEST,
        RoomError::UniqueQuestionUnavailable | RoomError::QuestionProviderUnavailable => {
            StatusCode::BAD_GATEWAY
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        (
            status,
            Json(serde_json::json!({ "message": self.0.to_string() })),
        )
            .into_response()
    }
}

use axum::{http::StatusCode, Json};
use serde::Serialize;

pub const MISSING_PARAMS: &str = "missing id or message parameter";

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);
pub type ApiResult<T> = Result<T, ApiError>;

fn error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            status: "error",
            error: msg.into(),
        }),
    )
}

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    error(StatusCode::BAD_REQUEST, msg)
}

pub fn internal_error(msg: impl Into<String>) -> ApiError {
    error(StatusCode::INTERNAL_SERVER_ERROR, msg)
}

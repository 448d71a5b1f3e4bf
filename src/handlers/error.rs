// src/handlers/error.rs
use std::fmt;

use warp::http::StatusCode;
use warp::reject::Reject;

/// Rejection raised by handlers for requests the engine cannot interpret.
/// `routes::handle_rejection` turns it into a JSON error body with the
/// carried status.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status: StatusCode,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    // Auth failures are reported uniformly; which check failed stays server-side.
    #[error("invalid request data")]
    Unauthenticated,
    #[error("field {key} exceeds limit {limit}")]
    Validation { key: &'static str, limit: usize },
    #[error("malformed request: {0}")]
    BadRequest(&'static str),
    #[error("not found")]
    NotFound,
    #[error("not authorized")]
    NotAuthorized,
    #[error("database error")]
    Db(#[from] diesel::result::Error),
    #[error("connection pool error")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (code, body) = match &self {
            ServerError::Unauthenticated => (
                StatusCode::FORBIDDEN,
                json!({ "ok": false, "error": "Invalid data" }),
            ),
            ServerError::Validation { key, limit } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "ok": false,
                    "error": "validation",
                    "details": { "key": key, "limit": limit },
                }),
            ),
            ServerError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "error": msg }),
            ),
            ServerError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "ok": false, "error": "Not found" }),
            ),
            ServerError::NotAuthorized => (
                StatusCode::FORBIDDEN,
                json!({ "ok": false, "error": "Not authorized" }),
            ),
            ServerError::Db(_) | ServerError::Pool(_) | ServerError::Io(_) => {
                error!("internal error serving request: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "ok": false, "error": "Server error" }),
                )
            }
        };
        (code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let resp = ServerError::Validation { key: "error_bio_too_long", limit: 1000 }
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_failure_is_forbidden() {
        let resp = ServerError::Unauthenticated.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}

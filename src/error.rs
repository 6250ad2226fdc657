use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::{envelope::Envelope, validation::FieldErrors};

pub type ApiResult<T> = Result<T, ApiError>;

/// Every failure a handler can report. Rendered as the error envelope
/// `{success: false, message, data}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error")]
    Validation(FieldErrors),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, data) = match self {
            ApiError::Validation(errors) => ("Validation error".to_string(), Some(errors)),
            ApiError::Internal(e) => {
                error!(error = ?e, "request failed");
                ("Internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = Envelope {
            success: false,
            data,
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Validation(FieldErrors::new()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::Unauthorized("Unauthorized").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("Product").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("taken".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(ApiError::NotFound("Product").to_string(), "Product not found");
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let res = ApiError::Internal(anyhow::anyhow!("password for db is hunter2")).into_response();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
        assert!(body["data"].is_null());
    }
}

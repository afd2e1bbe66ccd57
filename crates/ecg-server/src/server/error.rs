use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ecg_session::SessionError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(super) enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    BadRequest(String),
    #[error("refusing to serve a file outside the scratch directory")]
    Forbidden,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl ApiError {
    pub(super) fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(err) => match err {
                SessionError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                SessionError::NoDataAvailable
                | SessionError::NoSelection
                | SessionError::StaleSelection => StatusCode::CONFLICT,
                SessionError::IndexOutOfRange { .. }
                | SessionError::InvalidLeadConfiguration(_) => StatusCode::BAD_REQUEST,
                SessionError::GeneratorFailure(_)
                | SessionError::Render(_)
                | SessionError::ResourceExhaustion(_)
                | SessionError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Session(err) => err.code(),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Forbidden => "forbidden",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

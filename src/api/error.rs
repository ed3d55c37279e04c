//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::engine::{
    BookingError, EngineError, ErrorCode, LedgerError, RequestError, SettlementError, WalletError,
};

pub type ApiResult<T> = Result<T, ApiError>;

/// A failed request: stable code, human-readable message, 4xx status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: status_for(code),
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutOfRange, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unauthorized | ErrorCode::InvalidPin => StatusCode::UNAUTHORIZED,
        ErrorCode::OutOfRange => StatusCode::BAD_REQUEST,
        ErrorCode::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
        ErrorCode::InvalidTransition
        | ErrorCode::InvalidState
        | ErrorCode::DuplicateRequest
        | ErrorCode::AlreadyPaid
        | ErrorCode::AlreadyExists => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.code.as_str(),
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

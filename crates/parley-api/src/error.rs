use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Domain error variants, mapped to structured JSON error bodies at the
/// request boundary. Nothing is retried; every failure is terminal for the
/// request that hit it.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing required fields")]
    Validation,
    #[error("email already exists")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error("invalid or expired OTP")]
    InvalidOtp,
    #[error("email not verified, verify OTP first")]
    UnverifiedAccount,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("failed to send OTP email")]
    EmailDelivery(#[source] anyhow::Error),
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidOtp => "INVALID_OTP",
            Self::UnverifiedAccount => "UNVERIFIED_ACCOUNT",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::EmailDelivery(_) => "EMAIL_DELIVERY",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation
            | Self::DuplicateEmail
            | Self::InvalidOtp
            | Self::UnverifiedAccount
            | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // 4xx are expected client errors; tower-http's TraceLayer already
        // records method/uri/status. Errors carrying a source need their
        // chain logged here so the root cause is traceable, while the caller
        // only ever sees the generic message.
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = %e, kind = "INTERNAL", "internal error");
            }
            Self::EmailDelivery(e) => {
                tracing::error!(error = %e, kind = "EMAIL_DELIVERY", "OTP email send failed");
            }
            _ => {}
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

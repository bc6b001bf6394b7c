use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rollcall_core::attendance::AttendanceError;
use rollcall_core::error::CoreError;
use rollcall_core::pairing::PairingError;
use serde_json::json;

/// The only message a rejected device credential ever gets.
pub const INVALID_CREDENTIAL_MESSAGE: &str = "Invalid device credential";

/// The only message a rejected display token ever gets.
pub const INVALID_DISPLAY_TOKEN_MESSAGE: &str = "Invalid display token";

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors and adds HTTP-specific variants. Renders as
/// `{ "error": <message>, "code": <CODE> }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Attendance(#[from] AttendanceError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Device credential unknown, malformed or inactive. The cause is logged
    /// where it is detected and never rendered.
    #[error("Invalid device credential")]
    InvalidCredential,

    /// Display token unknown, malformed, inactive or expired.
    #[error("Invalid display token")]
    InvalidDisplayToken,

    /// Tapped card is not bound to an active student of the device's tenant.
    #[error("Card is not registered")]
    UnknownCard,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::Pairing(err) => {
                let code = match err {
                    PairingError::SessionActive { .. } => "PAIRING_SESSION_ACTIVE",
                    PairingError::StudentAlreadyPaired { .. } => "STUDENT_ALREADY_PAIRED",
                    PairingError::CardAlreadyBound { .. } => "CARD_ALREADY_BOUND",
                };
                (StatusCode::CONFLICT, code, err.to_string())
            }

            AppError::Attendance(err) => match err {
                AttendanceError::CheckOutBeforeCheckIn => {
                    (StatusCode::CONFLICT, "CHECK_OUT_BEFORE_CHECK_IN", err.to_string())
                }
                AttendanceError::UnknownStatus(_) | AttendanceError::UnknownMethod(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIAL",
                INVALID_CREDENTIAL_MESSAGE.to_string(),
            ),
            AppError::InvalidDisplayToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                INVALID_DISPLAY_TOKEN_MESSAGE.to_string(),
            ),

            AppError::UnknownCard => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_CARD",
                "Card is not registered to any student".to_string(),
            ),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a sqlx error to status, code and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique violations on constraints named `uq_*` map to 409.
/// - Check violations map to 409 `CONSTRAINT_VIOLATION`.
/// - Everything else is a 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            match db_err.code().as_deref() {
                Some("23505") if constraint.starts_with("uq_") => {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
                Some("23514") => {
                    return (
                        StatusCode::CONFLICT,
                        "CONSTRAINT_VIOLATION",
                        format!("Value violates check constraint: {constraint}"),
                    );
                }
                _ => {}
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

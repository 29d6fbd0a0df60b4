use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::seat::UnavailableSeat;

/// Single field failure reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
    #[error("{0}")]
    Conflict(String),
    /// A seat batch could not be held; carries every seat that blocked it.
    #[error("Some selected seats are not available")]
    SeatsUnavailable(Vec<UnavailableSeat>),
    #[error("{0}")]
    State(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.clone(),
            }],
            message,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        AppError::State(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } | AppError::State(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::SeatsUnavailable(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Postgres unique violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return AppError::Conflict("Resource already exists (duplicate entry)".to_string());
        }
        AppError::Database(err)
    }
}

/// `booking_deadline` -> `bookingDeadline`, matching the JSON field names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: camel_case(&field),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid ({})", field, e.code)),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::Validation {
            message: "Validation failed".to_string(),
            errors: fields,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation {
            message: rejection.body_text(),
            errors: Vec::new(),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation {
            message: rejection.body_text(),
            errors: Vec::new(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation {
            message: rejection.body_text(),
            errors: Vec::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation { message, errors } if !errors.is_empty() => {
                json!({ "message": message, "errors": errors })
            }
            AppError::SeatsUnavailable(seats) => json!({
                "message": self.to_string(),
                "unavailableSeats": seats,
            }),
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                json!({ "message": "Internal server error" })
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                json!({ "message": "Internal server error" })
            }
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::UnavailableReason;
    use uuid::Uuid;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn field_names_are_camel_cased() {
        assert_eq!(camel_case("booking_deadline"), "bookingDeadline");
        assert_eq!(camel_case("title"), "title");
    }

    #[tokio::test]
    async fn unavailable_seats_are_listed_in_body() {
        let (status, body) = body_of(AppError::SeatsUnavailable(vec![UnavailableSeat {
            seat_id: Uuid::nil(),
            row_number: 1,
            seat_number: 2,
            reason: UnavailableReason::AlreadyReserved,
        }]))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["unavailableSeats"][0]["reason"], "Already reserved");
        assert_eq!(body["unavailableSeats"][0]["seatNumber"], 2);
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = body_of(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn validation_carries_field_errors() {
        let (status, body) = body_of(AppError::validation("seatIds", "No seats specified")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "seatIds");
    }
}

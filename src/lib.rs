//! Pocketbook is a web app for tracking personal finances.
//!
//! This library provides a JSON REST API for logging income, expense, and
//! credit transactions and for managing accounts, budgets, recurring
//! services, savings goals, and investments. The data is surfaced through
//! dashboard and calendar aggregation endpoints consumed by a browser UI.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use time::Date;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod budget;
mod calendar;
mod dashboard;
mod database_id;
mod db;
mod diagnostics;
mod endpoints;
mod goal;
mod investment;
mod month;
mod pagination;
mod routing;
mod service;
mod transaction;
mod user;

pub use app_state::{AppState, OAuthConfig, create_cookie_key};
pub use auth::{PasswordHash, ValidatedPassword};
pub use db::initialize as initialize_db;
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use user::{User, UserID};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid email/password combination.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The session token cookie is missing from the request.
    #[error("no session cookie in the request")]
    CookieMissing,

    /// The session token has passed its expiry.
    #[error("the session has expired")]
    SessionExpired,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email used to register already belongs to a user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// The account name already exists for this user.
    #[error("the account \"{0}\" already exists")]
    DuplicateAccountName(String),

    /// A budget already exists for this category and month.
    #[error("a budget for \"{0}\" already exists in {1}")]
    DuplicateBudget(String, String),

    /// The service has already been marked paid for the month.
    #[error("the service has already been paid for {0}")]
    DuplicateServicePayment(String),

    /// A date in the future was used to create a transaction.
    ///
    /// Transactions record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// An amount was zero or negative where a positive amount is required.
    #[error("{0} is not a valid amount, amounts must be positive")]
    InvalidAmount(f64),

    /// A month string could not be parsed as "YYYY-MM".
    #[error("\"{0}\" is not a valid month, expected the format YYYY-MM")]
    InvalidMonth(String),

    /// A service due day was outside the range 1-31.
    #[error("{0} is not a valid due day, expected a day between 1 and 31")]
    InvalidDueDay(u8),

    /// An installment plan requested an unsupported number of installments.
    #[error("{0} is not a valid installment count, expected between 1 and 120")]
    InvalidInstallmentCount(u32),

    /// A credit transaction was submitted without an installment plan.
    #[error("credit transactions require an installment plan")]
    InstallmentPlanRequired,

    /// An installment plan was submitted for a non-credit transaction.
    #[error("only credit transactions may have an installment plan")]
    InstallmentPlanNotAllowed,

    /// The custom installment amounts do not sum to the financed total.
    ///
    /// Both values are in cents so the mismatch is exact.
    #[error("installment amounts sum to {got} cents, want {want} cents")]
    InstallmentSumMismatch {
        /// The financed total (principal plus interest) in cents.
        want: i64,
        /// The sum of the provided installment amounts in cents.
        got: i64,
    },

    /// The amount of a credit transaction was changed after creation.
    ///
    /// The installment schedule is derived from the amount, so changing it
    /// would desync the schedule. Delete and recreate the transaction instead.
    #[error("the amount of a credit transaction is fixed by its installment plan")]
    CreditAmountImmutable,

    /// An installment due date fell outside the supported calendar range.
    #[error("the installment schedule extends past the supported date range")]
    ScheduleOutOfRange,

    /// The OAuth callback state did not match the state cookie.
    ///
    /// This indicates a stale log-in attempt or a CSRF attempt, so the
    /// log-in is rejected outright.
    #[error("the OAuth state parameter does not match")]
    OAuthStateMismatch,

    /// OAuth log-in was attempted but no provider is configured.
    #[error("no OAuth provider is configured")]
    OAuthNotConfigured,

    /// The token exchange or user-info request to the OAuth provider failed.
    ///
    /// The error string should only be logged on the server.
    #[error("OAuth exchange failed: {0}")]
    OAuthExchange(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            Error::CookieMissing => (StatusCode::UNAUTHORIZED, "not_logged_in"),
            Error::SessionExpired => (StatusCode::UNAUTHORIZED, "session_expired"),
            Error::TooWeak(_) => (StatusCode::UNPROCESSABLE_ENTITY, "weak_password"),
            Error::DuplicateEmail => (StatusCode::CONFLICT, "duplicate_email"),
            Error::DuplicateAccountName(_) => (StatusCode::CONFLICT, "duplicate_account_name"),
            Error::DuplicateBudget(_, _) => (StatusCode::CONFLICT, "duplicate_budget"),
            Error::DuplicateServicePayment(_) => {
                (StatusCode::CONFLICT, "duplicate_service_payment")
            }
            Error::FutureDate(_) => (StatusCode::BAD_REQUEST, "future_date"),
            Error::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount"),
            Error::InvalidMonth(_) => (StatusCode::BAD_REQUEST, "invalid_month"),
            Error::InvalidDueDay(_) => (StatusCode::BAD_REQUEST, "invalid_due_day"),
            Error::InvalidInstallmentCount(_) => {
                (StatusCode::BAD_REQUEST, "invalid_installment_count")
            }
            Error::InstallmentPlanRequired => {
                (StatusCode::UNPROCESSABLE_ENTITY, "installment_plan_required")
            }
            Error::InstallmentPlanNotAllowed => {
                (StatusCode::UNPROCESSABLE_ENTITY, "installment_plan_not_allowed")
            }
            Error::InstallmentSumMismatch { .. } => {
                (StatusCode::BAD_REQUEST, "installment_sum_mismatch")
            }
            Error::CreditAmountImmutable => {
                (StatusCode::UNPROCESSABLE_ENTITY, "credit_amount_immutable")
            }
            Error::ScheduleOutOfRange => {
                (StatusCode::UNPROCESSABLE_ENTITY, "schedule_out_of_range")
            }
            Error::OAuthStateMismatch => (StatusCode::UNAUTHORIZED, "oauth_state_mismatch"),
            Error::OAuthNotConfigured => (StatusCode::SERVICE_UNAVAILABLE, "oauth_not_configured"),
            Error::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            // Any errors that are not handled above are not intended to be
            // shown to the client.
            Error::OAuthExchange(_)
            | Error::HashingError(_)
            | Error::JSONSerializationError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => {
                tracing::error!("An unexpected error occurred: {}", self);
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred, check the server logs for more details.",
                );
            }
        };

        error_response(status, code, &self.to_string())
    }
}

/// Build the uniform JSON error payload used by every endpoint.
fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        })),
    )
        .into_response()
}

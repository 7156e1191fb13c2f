//! Defines the endpoint for registering a new user with an email and password.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    auth::{PasswordHash, ValidatedPassword, set_auth_cookie},
    user::create_user,
};

/// The state needed to register a user.
#[derive(Clone)]
pub struct RegisterState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection for creating users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegisterState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegisterState> for Key {
    fn from_ref(state: &RegisterState) -> Self {
        state.cookie_key.clone()
    }
}

/// The request body for registering a user.
#[derive(Debug, Deserialize)]
pub struct RegisterData {
    /// The email address to register with.
    pub email: String,
    /// The plain-text password, validated for strength before hashing.
    pub password: String,
}

/// The subset of a user that is safe to return to the client.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// The new user's ID.
    pub id: i64,
    /// The email the user registered with.
    pub email: String,
}

/// A route handler for registering a new user.
///
/// The password must pass the strength check before it is hashed and stored.
/// On success the user is logged in immediately by setting the session
/// cookie.
///
/// # Errors
/// Returns:
/// - [Error::TooWeak] (422) if the password is too easy to guess.
/// - [Error::DuplicateEmail] (409) if the email is already registered.
pub async fn register_endpoint(
    State(state): State<RegisterState>,
    jar: PrivateCookieJar,
    Json(data): Json<RegisterData>,
) -> Result<Response, Error> {
    let password_hash = PasswordHash::new(
        ValidatedPassword::new(&data.password)?,
        PasswordHash::DEFAULT_COST,
    )?;

    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        create_user(&data.email, Some(&password_hash), &connection)?
    };

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(UserResponse {
            id: user.id.as_i64(),
            email: user.email,
        }),
    )
        .into_response())
}

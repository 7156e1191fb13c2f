//! Implements the client side of the OAuth redirect dance.
//!
//! The provider's authorization server is an external collaborator. This
//! module only generates the redirect, checks the CSRF state on the way
//! back, exchanges the authorization code for an access token, and
//! provisions the local user from the provider's profile.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rand::RngCore;
use rusqlite::Connection;
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error, OAuthConfig,
    auth::{
        cookie::{set_state_cookie, take_state_cookie},
        set_auth_cookie,
    },
    endpoints,
    user::get_or_create_user_by_email,
};

/// The state needed for the OAuth endpoints.
#[derive(Clone)]
pub struct OAuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The provider settings, if federated log-in is enabled.
    pub oauth_config: Option<OAuthConfig>,
    /// The database connection for provisioning users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for OAuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            oauth_config: state.oauth_config.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<OAuthState> for Key {
    fn from_ref(state: &OAuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Generate the random nonce used as the OAuth `state` parameter.
///
/// 32 random bytes, hex encoded.
fn generate_state_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);

    hex::encode(bytes)
}

/// A route handler that starts the OAuth redirect dance.
///
/// Generates the CSRF state nonce, stores it in a short-lived private
/// cookie, and redirects the client to the provider's authorization page.
///
/// # Errors
/// Returns [Error::OAuthNotConfigured] (503) if no provider is configured.
pub async fn oauth_start_endpoint(
    State(state): State<OAuthState>,
    jar: PrivateCookieJar,
) -> Result<Response, Error> {
    let config = state.oauth_config.as_ref().ok_or(Error::OAuthNotConfigured)?;

    let nonce = generate_state_nonce();
    let jar = set_state_cookie(jar, &nonce);

    let query = serde_urlencoded::to_string([
        ("response_type", "code"),
        ("client_id", &config.client_id),
        ("redirect_uri", &config.redirect_url),
        ("scope", "email"),
        ("state", &nonce),
    ])
    .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    let location = format!("{}?{}", config.authorize_url, query);

    Ok((jar, Redirect::to(&location)).into_response())
}

/// The query parameters the provider sends to the callback endpoint.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// The single-use authorization code to exchange for an access token.
    pub code: String,
    /// The CSRF state nonce, echoed back by the provider.
    pub state: String,
}

/// The provider's response to the code-for-token exchange.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The subset of the provider's user profile the app needs.
#[derive(Debug, Deserialize)]
struct UserInfo {
    email: String,
}

/// A route handler for the OAuth callback.
///
/// Verifies the `state` query parameter against the state cookie, exchanges
/// the authorization code for an access token, fetches the provider user's
/// email, creates the local user if they do not exist yet, and logs them in
/// by setting the session cookie.
///
/// # Errors
/// Returns:
/// - [Error::OAuthNotConfigured] (503) if no provider is configured.
/// - [Error::OAuthStateMismatch] (401) if the state cookie is missing or
///   does not match the query parameter.
/// - [Error::OAuthExchange] (500) if the provider rejects the exchange.
pub async fn oauth_callback_endpoint(
    State(state): State<OAuthState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, Error> {
    let config = state.oauth_config.as_ref().ok_or(Error::OAuthNotConfigured)?;

    let (jar, stored_state) = take_state_cookie(jar);
    match stored_state {
        Some(stored_state) if stored_state == params.state => {}
        _ => return Err(Error::OAuthStateMismatch),
    }

    let email = fetch_provider_email(config, &params.code).await?;

    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_or_create_user_by_email(&email, &connection)?
    };

    let jar = set_auth_cookie(jar, user.id, state.cookie_duration)?;

    Ok((jar, Redirect::to(endpoints::ROOT)).into_response())
}

/// Exchange the authorization code for an access token and fetch the email
/// address of the provider user.
async fn fetch_provider_email(config: &OAuthConfig, code: &str) -> Result<String, Error> {
    let client = reqwest::Client::new();

    let token_response = client
        .post(&config.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &config.redirect_url),
            ("client_id", &config.client_id),
            ("client_secret", &config.client_secret),
        ])
        .send()
        .await
        .map_err(|error| Error::OAuthExchange(error.to_string()))?
        .error_for_status()
        .map_err(|error| Error::OAuthExchange(error.to_string()))?;

    let token: TokenResponse = token_response
        .json()
        .await
        .map_err(|error| Error::OAuthExchange(error.to_string()))?;

    let userinfo: UserInfo = client
        .get(&config.userinfo_url)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|error| Error::OAuthExchange(error.to_string()))?
        .error_for_status()
        .map_err(|error| Error::OAuthExchange(error.to_string()))?
        .json()
        .await
        .map_err(|error| Error::OAuthExchange(error.to_string()))?;

    Ok(userinfo.email)
}

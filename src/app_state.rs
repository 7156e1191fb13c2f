//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{Error, auth::DEFAULT_COOKIE_DURATION, db::initialize, pagination::PaginationConfig};

/// The settings for the OAuth provider used for federated log-in.
///
/// The provider's authorization server is an external collaborator, the app
/// only performs the client side of the redirect dance.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// The client ID issued by the provider.
    pub client_id: String,
    /// The client secret issued by the provider.
    pub client_secret: String,
    /// The provider's authorization endpoint that the user is redirected to.
    pub authorize_url: String,
    /// The provider's endpoint for exchanging an authorization code for an
    /// access token.
    pub token_url: String,
    /// The provider's endpoint that returns the authenticated user's profile.
    pub userinfo_url: String,
    /// The absolute URL of this app's OAuth callback endpoint, as registered
    /// with the provider.
    pub redirect_url: String,
}

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The config that controls how list endpoints page their data.
    pub pagination_config: PaginationConfig,

    /// The OAuth provider settings, if federated log-in is enabled.
    pub oauth_config: Option<OAuthConfig>,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        pagination_config: PaginationConfig,
        oauth_config: Option<OAuthConfig>,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            pagination_config,
            oauth_config,
            db_connection: connection,
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret` string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}

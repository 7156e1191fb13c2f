//! Defines functions for handling user authentication with cookies.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{Error, user::UserID};

use super::Token;

/// The name of the cookie holding the serialized session token.
pub(crate) const COOKIE_TOKEN: &str = "token";
/// The name of the short-lived cookie holding the OAuth CSRF state nonce.
pub(crate) const COOKIE_STATE: &str = "oauth_state";
/// The default duration for which auth cookies are valid.
pub const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(30);
/// How long the client has to complete the OAuth redirect dance.
pub(crate) const STATE_COOKIE_DURATION: Duration = Duration::minutes(10);

/// Add an auth cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// Sets the expiry of the session to `duration` from the current time.
///
/// Returns the cookie jar with the cookie added.
///
/// # Errors
/// Returns [Error::JSONSerializationError] if the token cannot be serialized.
pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let expires_at = OffsetDateTime::now_utc() + duration;
    let token = Token {
        user_id,
        expires_at,
    };
    let token_string = serde_json::to_string(&token)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, token_string))
            .expires(expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Read and parse the session token from the cookie jar, and check that it
/// has not expired.
///
/// # Errors
/// Returns:
/// - [Error::CookieMissing] if there is no token cookie.
/// - [Error::InvalidCredentials] if the cookie cannot be parsed as a token.
/// - [Error::SessionExpired] if the token expiry has passed.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Result<Token, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;

    let token: Token =
        serde_json::from_str(cookie.value_trimmed()).map_err(|_| Error::InvalidCredentials)?;

    if token.expires_at <= OffsetDateTime::now_utc() {
        return Err(Error::SessionExpired);
    }

    Ok(token)
}

/// Store the OAuth CSRF state nonce in a short-lived private cookie.
///
/// The callback endpoint compares the provider-returned `state` query
/// parameter against this cookie.
pub(crate) fn set_state_cookie(jar: PrivateCookieJar, state: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_STATE, state.to_owned()))
            .expires(OffsetDateTime::now_utc() + STATE_COOKIE_DURATION)
            .http_only(true)
            // Lax so the cookie is sent on the provider's redirect back.
            .same_site(SameSite::Lax)
            .secure(true),
    )
}

/// Remove and return the OAuth CSRF state nonce, if present.
///
/// The cookie is single use: it is removed from the jar whether or not the
/// caller accepts the state.
pub(crate) fn take_state_cookie(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<String>) {
    match jar.get(COOKIE_STATE) {
        Some(cookie) => {
            let state = cookie.value_trimmed().to_owned();
            (jar.remove(Cookie::from(COOKIE_STATE)), Some(state))
        }
        None => (jar, None),
    }
}

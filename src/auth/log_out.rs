//! Defines the endpoint for logging out the current user.

use axum::{Json, response::{IntoResponse, Response}};
use axum_extra::extract::PrivateCookieJar;
use serde_json::json;

use crate::auth::invalidate_auth_cookie;

/// Handler for log-out requests.
///
/// Invalidates the session cookie so the client deletes it. Logging out
/// while not logged in is not an error.
pub async fn log_out_endpoint(jar: PrivateCookieJar) -> Response {
    let jar = invalidate_auth_cookie(jar);

    (jar, Json(json!({"logged_out": true}))).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{Router, routing::post};
    use axum_test::TestServer;
    use time::OffsetDateTime;

    use crate::{
        app_state::create_cookie_key,
        auth::{
            COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, middleware::AuthState, set_auth_cookie,
        },
        endpoints,
        user::UserID,
    };

    #[tokio::test]
    async fn log_out_expires_token_cookie() {
        let state = AuthState {
            cookie_key: create_cookie_key("wuzzapokalypse"),
            cookie_duration: DEFAULT_COOKIE_DURATION,
        };
        let app = Router::new()
            .route(endpoints::LOG_OUT, post(super::log_out_endpoint))
            .with_state(state.clone());
        let server = TestServer::new(app).unwrap();

        let jar = set_auth_cookie(
            axum_extra::extract::PrivateCookieJar::new(state.cookie_key.clone()),
            UserID::new(1),
            DEFAULT_COOKIE_DURATION,
        )
        .unwrap();
        let cookie = jar.get(COOKIE_TOKEN).unwrap();

        let response = server.post(endpoints::LOG_OUT).add_cookie(cookie).await;

        response.assert_status_ok();
        let cleared = response.cookie(COOKIE_TOKEN);
        assert_eq!(cleared.value(), "deleted");
        assert_eq!(
            cleared.expires_datetime(),
            Some(OffsetDateTime::UNIX_EPOCH)
        );
    }
}

//! An endpoint for fetching the currently logged-in user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;

use crate::{AppState, Error, user::{UserID, get_user_by_id}};

use super::register::UserResponse;

/// The state needed to look up the current user.
#[derive(Debug, Clone)]
pub struct MeState {
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for MeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the logged-in user's profile.
pub async fn me_endpoint(
    State(state): State<MeState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<UserResponse>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;

    Ok(Json(UserResponse {
        id: user.id.as_i64(),
        email: user.email,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::State};
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        user::{UserID, create_user},
    };

    use super::{MeState, me_endpoint};

    fn get_test_state() -> MeState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("foo@bar.baz", None, &conn).unwrap();

        MeState {
            db_connection: Arc::new(Mutex::new(conn)),
        }
    }

    #[tokio::test]
    async fn returns_the_logged_in_users_profile() {
        let state = get_test_state();

        let Json(response) = me_endpoint(State(state), Extension(UserID::new(1)))
            .await
            .unwrap();

        assert_eq!(response.email, "foo@bar.baz");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let state = get_test_state();

        let result = me_endpoint(State(state), Extension(UserID::new(42))).await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }
}

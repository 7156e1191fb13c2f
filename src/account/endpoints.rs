//! Defines the CRUD endpoints for accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, params};
use serde::Deserialize;

use crate::{AppState, Error, database_id::DatabaseId, user::UserID};

use super::core::{Account, AccountKind, map_row_to_account};

/// The state needed to manage accounts.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or updating an account.
#[derive(Debug, Deserialize)]
pub struct AccountData {
    /// The account name, unique per user.
    pub name: String,
    /// What kind of account this is.
    pub kind: AccountKind,
    /// The current balance.
    pub balance: f64,
}

/// A route handler for creating a new account.
pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<AccountData>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let account = create_account(user_id, &data, &connection)?;

    Ok((StatusCode::CREATED, Json(account)).into_response())
}

pub(crate) fn create_account(
    user_id: UserID,
    data: &AccountData,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .execute(
            "INSERT INTO account (user_id, name, kind, balance) VALUES (?1, ?2, ?3, ?4)",
            params![user_id.as_i64(), data.name, data.kind.as_str(), data.balance],
        )
        .map_err(|error| match error {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(error, Some(_)) if error.extended_code == 2067 => {
                Error::DuplicateAccountName(data.name.clone())
            }
            error => error.into(),
        })?;

    Ok(Account {
        id: connection.last_insert_rowid(),
        name: data.name.clone(),
        kind: data.kind,
        balance: data.balance,
    })
}

/// A route handler for listing the user's accounts, ordered by name.
pub async fn list_accounts_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Account>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let accounts = connection
        .prepare(
            "SELECT id, name, kind, balance FROM account \
            WHERE user_id = :user_id ORDER BY name ASC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(accounts))
}

/// A route handler for getting a single account by its ID.
pub async fn get_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<DatabaseId>,
) -> Result<Json<Account>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let account = connection
        .prepare(
            "SELECT id, name, kind, balance FROM account WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            &[(":id", &account_id), (":user_id", &user_id.as_i64())],
            map_row_to_account,
        )?;

    Ok(Json(account))
}

/// A route handler for updating an account's name, kind, and balance.
pub async fn update_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<DatabaseId>,
    Json(data): Json<AccountData>,
) -> Result<Json<Account>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_updated = connection
        .execute(
            "UPDATE account SET name = ?1, kind = ?2, balance = ?3 \
            WHERE id = ?4 AND user_id = ?5",
            params![
                data.name,
                data.kind.as_str(),
                data.balance,
                account_id,
                user_id.as_i64()
            ],
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(error, Some(_)) if error.extended_code == 2067 => {
                Error::DuplicateAccountName(data.name.clone())
            }
            error => error.into(),
        })?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(Json(Account {
        id: account_id,
        name: data.name,
        kind: data.kind,
        balance: data.balance,
    }))
}

/// A route handler for deleting an account.
///
/// Transactions referencing the account keep their history, the reference is
/// cleared by the schema's ON DELETE SET NULL.
pub async fn delete_account_endpoint(
    State(state): State<AccountState>,
    Extension(user_id): Extension<UserID>,
    Path(account_id): Path<DatabaseId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_deleted = connection.execute(
        "DELETE FROM account WHERE id = ?1 AND user_id = ?2",
        params![account_id, user_id.as_i64()],
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::{Path, State}};
    use rusqlite::Connection;

    use crate::{
        Error,
        account::core::{Account, AccountKind},
        db::initialize,
        user::{UserID, create_user},
    };

    use super::{
        AccountData, AccountState, create_account_endpoint, delete_account_endpoint,
        get_account_endpoint, list_accounts_endpoint, update_account_endpoint,
    };

    fn get_test_state() -> AccountState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("foo@bar.baz", None, &conn).unwrap();

        AccountState {
            db_connection: Arc::new(Mutex::new(conn)),
        }
    }

    fn checking_account_data(name: &str, balance: f64) -> AccountData {
        AccountData {
            name: name.to_owned(),
            kind: AccountKind::Checking,
            balance,
        }
    }

    #[tokio::test]
    async fn can_create_and_get_account() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_account_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(checking_account_data("Everyday", 123.45)),
        )
        .await
        .unwrap();

        let Json(account) =
            get_account_endpoint(State(state), Extension(user_id), Path(1))
                .await
                .unwrap();

        assert_eq!(
            account,
            Account {
                id: 1,
                name: "Everyday".to_owned(),
                kind: AccountKind::Checking,
                balance: 123.45,
            }
        );
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_account_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(checking_account_data("Everyday", 0.0)),
        )
        .await
        .unwrap();

        let result = create_account_endpoint(
            State(state),
            Extension(user_id),
            Json(checking_account_data("Everyday", 10.0)),
        )
        .await;

        assert_eq!(
            result.err(),
            Some(Error::DuplicateAccountName("Everyday".to_owned()))
        );
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        for name in ["Zeta", "Alpha"] {
            create_account_endpoint(
                State(state.clone()),
                Extension(user_id),
                Json(checking_account_data(name, 0.0)),
            )
            .await
            .unwrap();
        }

        let Json(accounts) = list_accounts_endpoint(State(state), Extension(user_id))
            .await
            .unwrap();

        let names: Vec<&str> = accounts.iter().map(|account| account.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn update_changes_balance() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_account_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(checking_account_data("Everyday", 0.0)),
        )
        .await
        .unwrap();

        let Json(account) = update_account_endpoint(
            State(state),
            Extension(user_id),
            Path(1),
            Json(checking_account_data("Everyday", 999.99)),
        )
        .await
        .unwrap();

        assert_eq!(account.balance, 999.99);
    }

    #[tokio::test]
    async fn update_missing_account_is_not_found() {
        let state = get_test_state();

        let result = update_account_endpoint(
            State(state),
            Extension(UserID::new(1)),
            Path(42),
            Json(checking_account_data("Ghost", 0.0)),
        )
        .await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[tokio::test]
    async fn delete_removes_account() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_account_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(checking_account_data("Everyday", 0.0)),
        )
        .await
        .unwrap();

        delete_account_endpoint(State(state.clone()), Extension(user_id), Path(1))
            .await
            .unwrap();

        let result = get_account_endpoint(State(state), Extension(user_id), Path(1)).await;
        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[tokio::test]
    async fn users_cannot_see_each_others_accounts() {
        let state = get_test_state();
        {
            let conn = state.db_connection.lock().unwrap();
            create_user("other@bar.baz", None, &conn).unwrap();
        }

        create_account_endpoint(
            State(state.clone()),
            Extension(UserID::new(1)),
            Json(checking_account_data("Mine", 100.0)),
        )
        .await
        .unwrap();

        let result =
            get_account_endpoint(State(state), Extension(UserID::new(2)), Path(1)).await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }
}

//! Defines the user of the application and functions for creating and
//! retrieving users.

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash};

/// The ID of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The underlying integer ID.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// A registered user of the application.
///
/// Users created through the OAuth flow have no password hash, they can only
/// log in through their provider.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID.
    pub id: UserID,
    /// The email address the user registered with.
    pub email: String,
    /// The user's hashed password, if they registered with one.
    pub password_hash: Option<PasswordHash>,
}

pub(crate) fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_user(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_hash: Option<String> = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        password_hash: raw_hash.map(|hash| PasswordHash::new_unchecked(&hash)),
    })
}

/// Insert a new user with `email` and an optional password hash.
///
/// # Errors
/// Returns [Error::DuplicateEmail] if a user with `email` already exists, or
/// [Error::SqlError] for any other SQL error.
pub(crate) fn create_user(
    email: &str,
    password_hash: Option<&PasswordHash>,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (email, password_hash) VALUES (?1, ?2)",
        params![email, password_hash.map(|hash| hash.to_string())],
    )?;

    Ok(User {
        id: UserID::new(connection.last_insert_rowid()),
        email: email.to_owned(),
        password_hash: password_hash.cloned(),
    })
}

/// Look up a user by their email address.
///
/// # Errors
/// Returns [Error::NotFound] if no user has `email`.
pub(crate) fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    let user = connection
        .prepare("SELECT id, email, password_hash FROM user WHERE email = :email")?
        .query_row(&[(":email", email)], map_row_to_user)?;

    Ok(user)
}

/// Look up a user by their ID.
///
/// # Errors
/// Returns [Error::NotFound] if no user has `id`.
pub(crate) fn get_user_by_id(id: UserID, connection: &Connection) -> Result<User, Error> {
    let user = connection
        .prepare("SELECT id, email, password_hash FROM user WHERE id = :id")?
        .query_row(&[(":id", &id.as_i64())], map_row_to_user)?;

    Ok(user)
}

/// Fetch the user with `email`, creating a password-less user if none exists.
///
/// Used by the OAuth callback, where the provider has already verified the
/// email address.
pub(crate) fn get_or_create_user_by_email(
    email: &str,
    connection: &Connection,
) -> Result<User, Error> {
    match get_user_by_email(email, connection) {
        Ok(user) => Ok(user),
        Err(Error::NotFound) => create_user(email, None, connection),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{Error, auth::PasswordHash, db::initialize};

    use super::{create_user, get_or_create_user_by_email, get_user_by_email, get_user_by_id};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_and_get_user_by_email() {
        let conn = get_test_connection();
        let hash = PasswordHash::new_unchecked("hunter2");

        let inserted = create_user("foo@bar.baz", Some(&hash), &conn).unwrap();
        let selected = get_user_by_email("foo@bar.baz", &conn).unwrap();

        assert_eq!(inserted, selected);
    }

    #[test]
    fn create_and_get_user_by_id() {
        let conn = get_test_connection();

        let inserted = create_user("foo@bar.baz", None, &conn).unwrap();
        let selected = get_user_by_id(inserted.id, &conn).unwrap();

        assert_eq!(inserted, selected);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = get_test_connection();
        create_user("foo@bar.baz", None, &conn).unwrap();

        let result = create_user("foo@bar.baz", None, &conn);

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn get_user_by_email_fails_for_unknown_email() {
        let conn = get_test_connection();

        let result = get_user_by_email("nobody@example.com", &conn);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_or_create_creates_passwordless_user() {
        let conn = get_test_connection();

        let user = get_or_create_user_by_email("oauth@example.com", &conn).unwrap();

        assert_eq!(user.password_hash, None);
        assert_eq!(
            get_or_create_user_by_email("oauth@example.com", &conn).unwrap(),
            user
        );
    }
}

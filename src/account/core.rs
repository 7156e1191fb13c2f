use rusqlite::{Connection, Row, types::Type};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, user::UserID};

/// The kind of money store an account represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// An everyday bank account.
    Checking,
    /// An interest-bearing bank account.
    Savings,
    /// A credit card, whose balance is what is owed.
    CreditCard,
    /// Physical cash.
    Wallet,
}

impl AccountKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::CreditCard => "credit_card",
            AccountKind::Wallet => "wallet",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "checking" => Some(AccountKind::Checking),
            "savings" => Some(AccountKind::Savings),
            "credit_card" => Some(AccountKind::CreditCard),
            "wallet" => Some(AccountKind::Wallet),
            _ => None,
        }
    }
}

/// An account and the amount of money it currently holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The ID for the account.
    pub id: DatabaseId,
    /// The name of the account.
    pub name: String,
    /// What kind of account this is.
    pub kind: AccountKind,
    /// The current balance.
    pub balance: f64,
}

pub(crate) fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            balance REAL NOT NULL,
            UNIQUE(user_id, name),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    let raw_kind: String = row.get(2)?;
    let kind = AccountKind::from_name(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown account kind \"{raw_kind}\"").into(),
        )
    })?;

    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        kind,
        balance: row.get(3)?,
    })
}

/// Get the total balance across all of a user's accounts.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub(crate) fn get_total_account_balance(
    user_id: UserID,
    connection: &Connection,
) -> Result<f64, Error> {
    let total = connection
        .prepare("SELECT COALESCE(SUM(balance), 0) FROM account WHERE user_id = :user_id")?
        .query_row(&[(":user_id", &user_id.as_i64())], |row| row.get(0))?;

    Ok(total)
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_account_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_account_table(&connection));
    }
}

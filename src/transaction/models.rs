//! The transaction model and its database table.

use rusqlite::{Connection, Row, types::Type};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::database_id::DatabaseId;

/// Whether a transaction brings money in, spends it, or finances a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money received, e.g. salary.
    Income,
    /// Money spent outright.
    Expense,
    /// A financed purchase repaid in monthly installments.
    Credit,
}

impl TransactionKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Credit => "credit",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "income" => Some(TransactionKind::Income),
            "expense" => Some(TransactionKind::Expense),
            "credit" => Some(TransactionKind::Credit),
            _ => None,
        }
    }
}

/// A single logged transaction.
///
/// For credit transactions `amount` is the principal, the interest lives in
/// the installment rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID for the transaction.
    pub id: DatabaseId,
    /// The amount of money in dollars.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The category used for budget aggregation, e.g. "groceries".
    pub category: String,
    /// Whether this is income, an expense, or a credit purchase.
    pub kind: TransactionKind,
    /// The account the money moved through, if any.
    pub account_id: Option<DatabaseId>,
}

pub(crate) fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            kind TEXT NOT NULL,
            account_id INTEGER,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_transaction(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let raw_kind: String = row.get(5)?;
    let kind = TransactionKind::from_name(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown transaction kind \"{raw_kind}\"").into(),
        )
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        date: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        kind,
        account_id: row.get(6)?,
    })
}

/// The column list matching [map_row_to_transaction], without the table name.
pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, amount, date, description, category, kind, account_id";

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_transaction_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_transaction_table(&connection));
    }
}

//! Read-only transaction queries shared by the dashboard and calendar.

use rusqlite::Connection;
use time::Date;

use crate::{Error, user::UserID};

use super::installment::{Installment, map_row_to_installment};
use super::models::{TRANSACTION_COLUMNS, Transaction, TransactionKind, map_row_to_transaction};

/// Get the user's transactions dated within `[start, end]`, oldest first.
pub(crate) fn get_transactions_in_range(
    user_id: UserID,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
            WHERE user_id = :user_id AND date BETWEEN :start AND :end \
            ORDER BY date ASC, id ASC"
        ))?
        .query_map(
            &[
                (":user_id", &user_id.as_i64() as &dyn rusqlite::ToSql),
                (":start", &start),
                (":end", &end),
            ],
            map_row_to_transaction,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect()
}

/// Sum the user's transaction amounts of one kind within `[start, end]`.
///
/// Returns zero when there are no matching transactions.
pub(crate) fn sum_amount_by_kind(
    user_id: UserID,
    kind: TransactionKind,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<f64, Error> {
    let total = connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0.0) FROM \"transaction\" \
            WHERE user_id = :user_id AND kind = :kind AND date BETWEEN :start AND :end",
        )?
        .query_row(
            &[
                (":user_id", &user_id.as_i64() as &dyn rusqlite::ToSql),
                (":kind", &kind.as_str()),
                (":start", &start),
                (":end", &end),
            ],
            |row| row.get(0),
        )?;

    Ok(total)
}

/// Sum the user's expenses per category within `[start, end]`, largest first.
pub(crate) fn expense_totals_by_category(
    user_id: UserID,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<(String, f64)>, Error> {
    connection
        .prepare(
            "SELECT category, SUM(amount) FROM \"transaction\" \
            WHERE user_id = :user_id AND kind = 'expense' AND date BETWEEN :start AND :end \
            GROUP BY category ORDER BY SUM(amount) DESC",
        )?
        .query_map(
            &[
                (":user_id", &user_id.as_i64() as &dyn rusqlite::ToSql),
                (":start", &start),
                (":end", &end),
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?
        .map(|maybe_row| maybe_row.map_err(Error::SqlError))
        .collect()
}

/// Count the user's unpaid installments due within `[start, end]`.
pub(crate) fn count_unpaid_installments_due(
    user_id: UserID,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<i64, Error> {
    let count = connection
        .prepare(
            "SELECT COUNT(*) FROM installment \
            JOIN \"transaction\" ON \"transaction\".id = installment.transaction_id \
            WHERE \"transaction\".user_id = :user_id \
                AND installment.paid_date IS NULL \
                AND installment.due_date BETWEEN :start AND :end",
        )?
        .query_row(
            &[
                (":user_id", &user_id.as_i64() as &dyn rusqlite::ToSql),
                (":start", &start),
                (":end", &end),
            ],
            |row| row.get(0),
        )?;

    Ok(count)
}

/// Get the user's installments due within `[start, end]`, earliest first.
pub(crate) fn get_installments_due_in_range(
    user_id: UserID,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Installment>, Error> {
    connection
        .prepare(
            "SELECT installment.id, installment.transaction_id, installment.number, \
                installment.amount, installment.due_date, installment.paid_date \
            FROM installment \
            JOIN \"transaction\" ON \"transaction\".id = installment.transaction_id \
            WHERE \"transaction\".user_id = :user_id \
                AND installment.due_date BETWEEN :start AND :end \
            ORDER BY installment.due_date ASC, installment.number ASC",
        )?
        .query_map(
            &[
                (":user_id", &user_id.as_i64() as &dyn rusqlite::ToSql),
                (":start", &start),
                (":end", &end),
            ],
            map_row_to_installment,
        )?
        .map(|maybe_installment| maybe_installment.map_err(Error::SqlError))
        .collect()
}

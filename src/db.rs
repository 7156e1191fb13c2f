//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    account::create_account_table,
    budget::create_budget_table,
    goal::create_goal_table,
    investment::create_investment_table,
    service::{create_service_history_table, create_service_table},
    transaction::{create_installment_table, create_transaction_table},
    user::create_user_table,
};

/// Create the tables for the application's domain models.
///
/// The tables are created inside a single exclusive transaction so that a
/// concurrent process cannot observe a half-initialized schema.
///
/// # Errors
/// Returns an error if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), crate::Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_installment_table(&transaction)?;
    create_service_table(&transaction)?;
    create_service_history_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_goal_table(&transaction)?;
    create_investment_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

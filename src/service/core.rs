//! The recurring service and service history models and their tables.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::Date;

use crate::{Error, database_id::DatabaseId, user::UserID};

/// A recurring monthly bill such as a utility or subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    /// The ID for the service.
    pub id: DatabaseId,
    /// The service name, e.g. "electricity".
    pub name: String,
    /// The expected monthly amount in dollars.
    pub amount: f64,
    /// The day of the month the bill is due, 1-31.
    ///
    /// In months shorter than the due day the bill is due on the last day of
    /// the month.
    pub due_day: u8,
    /// Whether the service is still being billed.
    pub active: bool,
}

/// One month's payment record for a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHistory {
    /// The ID for the history entry.
    pub id: DatabaseId,
    /// The service this payment belongs to.
    pub service_id: DatabaseId,
    /// The month the payment covers, as "YYYY-MM".
    pub month: String,
    /// The amount paid in dollars.
    pub amount: f64,
    /// When the payment was made.
    pub paid_date: Date,
}

pub(crate) fn create_service_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS service (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            amount REAL NOT NULL,
            due_day INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn create_service_history_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS service_history (
            id INTEGER PRIMARY KEY,
            service_id INTEGER NOT NULL,
            month TEXT NOT NULL,
            amount REAL NOT NULL,
            paid_date TEXT NOT NULL,
            UNIQUE(service_id, month),
            FOREIGN KEY(service_id) REFERENCES service(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_service(row: &Row) -> Result<Service, rusqlite::Error> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        amount: row.get(2)?,
        due_day: row.get(3)?,
        active: row.get(4)?,
    })
}

pub(crate) fn map_row_to_history(row: &Row) -> Result<ServiceHistory, rusqlite::Error> {
    Ok(ServiceHistory {
        id: row.get(0)?,
        service_id: row.get(1)?,
        month: row.get(2)?,
        amount: row.get(3)?,
        paid_date: row.get(4)?,
    })
}

/// The column list matching [map_row_to_service].
pub(crate) const SERVICE_COLUMNS: &str = "id, name, amount, due_day, active";

/// Get the user's active services, ordered by name.
pub(crate) fn get_active_services(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Service>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service \
            WHERE user_id = :user_id AND active = 1 ORDER BY name ASC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row_to_service)?
        .map(|maybe_service| maybe_service.map_err(Error::SqlError))
        .collect()
}

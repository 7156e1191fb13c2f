//! The calendar endpoint lays one month's activity out day by day:
//! transactions that happened, installments coming due, and recurring
//! services coming due.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::Serialize;
use time::{Date, Month, util::days_in_year_month};

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    month::month_bounds,
    service::{Service, get_active_services},
    transaction::{Installment, Transaction, get_installments_due_in_range, get_transactions_in_range},
    user::UserID,
};

/// The state needed to build the calendar.
#[derive(Debug, Clone)]
pub struct CalendarState {
    /// The database connection for reading the calendar data.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CalendarState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A recurring service shown on the day it comes due.
#[derive(Debug, PartialEq, Serialize)]
pub struct ServiceDue {
    /// The service's ID.
    pub service_id: DatabaseId,
    /// The service name.
    pub name: String,
    /// The expected monthly amount in dollars.
    pub amount: f64,
    /// Whether the service has been paid for this month.
    pub paid: bool,
}

/// One day of the calendar month.
#[derive(Debug, Serialize)]
pub struct CalendarDay {
    /// The date of this day.
    pub date: Date,
    /// The transactions logged on this day, oldest first.
    pub transactions: Vec<Transaction>,
    /// The installments due on this day.
    pub installments_due: Vec<Installment>,
    /// The active services due on this day.
    pub services_due: Vec<ServiceDue>,
}

/// One month's activity, one entry per day.
#[derive(Debug, Serialize)]
pub struct CalendarMonth {
    /// The calendar year.
    pub year: i32,
    /// The calendar month, 1-12.
    pub month: u8,
    /// The days of the month in order, always covering the whole month.
    pub days: Vec<CalendarDay>,
}

/// A route handler that lays a month's activity out day by day.
///
/// A service whose due day is past the end of the month (e.g. day 31 in
/// February) is shown on the last day of the month.
pub async fn calendar_endpoint(
    State(state): State<CalendarState>,
    Extension(user_id): Extension<UserID>,
    Path((year, month_number)): Path<(i32, u8)>,
) -> Result<Json<CalendarMonth>, Error> {
    // The calendar supports four-digit years, matching the "YYYY-MM" month
    // strings used everywhere else.
    if !(1..=9999).contains(&year) {
        return Err(Error::InvalidMonth(format!("{year}-{month_number}")));
    }

    let month = Month::try_from(month_number)
        .map_err(|_| Error::InvalidMonth(format!("{year}-{month_number}")))?;
    let (start, end) = month_bounds(year, month);
    let last_day = days_in_year_month(year, month);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = get_transactions_in_range(user_id, start, end, &connection)?;
    let installments = get_installments_due_in_range(user_id, start, end, &connection)?;
    let services = get_active_services(user_id, &connection)?;
    let paid_service_ids = get_paid_service_ids(year, month, &connection)?;

    let days = (1..=last_day)
        .map(|day| {
            // The day is within the month by construction.
            let date = Date::from_calendar_date(year, month, day).expect("day fits in month");

            CalendarDay {
                date,
                transactions: transactions
                    .iter()
                    .filter(|transaction| transaction.date == date)
                    .cloned()
                    .collect(),
                installments_due: installments
                    .iter()
                    .filter(|installment| installment.due_date == date)
                    .cloned()
                    .collect(),
                services_due: services
                    .iter()
                    .filter(|service| service.due_day.min(last_day) == day)
                    .map(|service| to_service_due(service, &paid_service_ids))
                    .collect(),
            }
        })
        .collect();

    Ok(Json(CalendarMonth {
        year,
        month: month_number,
        days,
    }))
}

fn to_service_due(service: &Service, paid_service_ids: &[DatabaseId]) -> ServiceDue {
    ServiceDue {
        service_id: service.id,
        name: service.name.clone(),
        amount: service.amount,
        paid: paid_service_ids.contains(&service.id),
    }
}

/// The IDs of services that have a payment recorded for the given month.
fn get_paid_service_ids(
    year: i32,
    month: Month,
    connection: &Connection,
) -> Result<Vec<DatabaseId>, Error> {
    let month_string = format!("{year:04}-{:02}", month as u8);

    connection
        .prepare("SELECT service_id FROM service_history WHERE month = :month")?
        .query_map(&[(":month", &month_string)], |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(Error::SqlError))
        .collect()
}

//! The installment calculator for credit transactions, plus the endpoints
//! for listing a plan and marking installments paid.
//!
//! A credit purchase finances a principal plus interest, repaid in N monthly
//! installments. The split is either equal (with the final installment
//! absorbing the rounding remainder so the plan sums exactly) or custom
//! amounts supplied by the caller.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, util::days_in_year_month};

use crate::{AppState, Error, database_id::DatabaseId, user::UserID};

/// The largest number of monthly installments a plan may have.
const MAX_INSTALLMENT_COUNT: u32 = 120;

/// The request body describing how to split a credit transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallmentPlan {
    /// The interest charged on top of the principal, in dollars.
    pub interest: f64,
    /// How many monthly installments to split the total into.
    pub count: u32,
    /// When the first installment is due.
    pub first_due_date: Date,
    /// Custom installment amounts. When omitted the total is split equally.
    ///
    /// Must have `count` entries that sum to principal + interest.
    #[serde(default)]
    pub amounts: Option<Vec<f64>>,
}

/// One scheduled repayment of a credit transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Installment {
    /// The ID for the installment.
    pub id: DatabaseId,
    /// The credit transaction this installment repays.
    pub transaction_id: DatabaseId,
    /// The one-based position of this installment in the plan.
    pub number: u32,
    /// The amount due, in dollars.
    pub amount: f64,
    /// When this installment is due.
    pub due_date: Date,
    /// When this installment was paid, if it has been.
    pub paid_date: Option<Date>,
}

pub(crate) fn create_installment_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS installment (
            id INTEGER PRIMARY KEY,
            transaction_id INTEGER NOT NULL,
            number INTEGER NOT NULL,
            amount REAL NOT NULL,
            due_date TEXT NOT NULL,
            paid_date TEXT,
            UNIQUE(transaction_id, number),
            FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_installment(row: &Row) -> Result<Installment, rusqlite::Error> {
    Ok(Installment {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        number: row.get(2)?,
        amount: row.get(3)?,
        due_date: row.get(4)?,
        paid_date: row.get(5)?,
    })
}

/// Convert a dollar amount to whole cents so installment arithmetic is exact.
pub(crate) fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Split `total_cents` into `count` near-equal installment amounts.
///
/// Every installment gets the truncated share and the final installment
/// absorbs the remainder, so the amounts always sum to `total_cents`.
fn split_equally(total_cents: i64, count: u32) -> Vec<i64> {
    let count = count as i64;
    let base = total_cents / count;
    let remainder = total_cents - base * count;

    let mut amounts = vec![base; count as usize];
    if let Some(last) = amounts.last_mut() {
        *last += remainder;
    }

    amounts
}

/// Validate custom installment amounts against the financed total.
///
/// # Errors
/// Returns [Error::InvalidInstallmentCount] if the number of amounts does not
/// match the plan's count, or [Error::InstallmentSumMismatch] if they do not
/// sum to `total_cents` exactly.
fn validate_custom_amounts(
    total_cents: i64,
    count: u32,
    amounts: &[f64],
) -> Result<Vec<i64>, Error> {
    if amounts.len() != count as usize {
        return Err(Error::InvalidInstallmentCount(amounts.len() as u32));
    }

    let cents: Vec<i64> = amounts.iter().copied().map(to_cents).collect();
    let got: i64 = cents.iter().sum();

    if got != total_cents {
        return Err(Error::InstallmentSumMismatch {
            want: total_cents,
            got,
        });
    }

    Ok(cents)
}

/// The due date of the installment `offset` months after the first.
///
/// The nominal due day is the first due date's day of month. When that day
/// does not exist in the target month (e.g. the 31st in February), the due
/// date rolls forward to the first day of the following month.
///
/// # Errors
/// Returns [Error::ScheduleOutOfRange] if the target date falls past the
/// latest year the calendar supports.
fn due_date_with_roll_forward(first_due_date: Date, offset: u32) -> Result<Date, Error> {
    let mut year = first_due_date.year();
    let mut month = first_due_date.month();

    for _ in 0..offset {
        if month == Month::December {
            year += 1;
        }
        month = month.next();
    }

    let day = first_due_date.day();
    let date = if day <= days_in_year_month(year, month) {
        Date::from_calendar_date(year, month, day)
    } else {
        if month == Month::December {
            year += 1;
        }
        Date::from_calendar_date(year, month.next(), 1)
    };

    date.map_err(|_| Error::ScheduleOutOfRange)
}

/// A scheduled installment before it is written to the database.
#[derive(Debug, PartialEq)]
pub(crate) struct ScheduledInstallment {
    pub number: u32,
    pub amount: f64,
    pub due_date: Date,
}

/// Compute the full repayment schedule for a credit transaction.
///
/// # Errors
/// Returns:
/// - [Error::InvalidInstallmentCount] if the count is 0 or above the maximum.
/// - [Error::InvalidAmount] if the interest is negative.
/// - [Error::InstallmentSumMismatch] if custom amounts do not sum to
///   principal + interest.
/// - [Error::ScheduleOutOfRange] if a due date falls past the latest year
///   the calendar supports.
pub(crate) fn build_schedule(
    principal: f64,
    plan: &InstallmentPlan,
) -> Result<Vec<ScheduledInstallment>, Error> {
    if plan.count == 0 || plan.count > MAX_INSTALLMENT_COUNT {
        return Err(Error::InvalidInstallmentCount(plan.count));
    }

    if plan.interest < 0.0 {
        return Err(Error::InvalidAmount(plan.interest));
    }

    let total_cents = to_cents(principal) + to_cents(plan.interest);

    let amounts = match &plan.amounts {
        Some(amounts) => validate_custom_amounts(total_cents, plan.count, amounts)?,
        None => split_equally(total_cents, plan.count),
    };

    let mut schedule = Vec::with_capacity(amounts.len());
    for (index, cents) in amounts.into_iter().enumerate() {
        schedule.push(ScheduledInstallment {
            number: index as u32 + 1,
            amount: from_cents(cents),
            due_date: due_date_with_roll_forward(plan.first_due_date, index as u32)?,
        });
    }

    Ok(schedule)
}

/// Insert the schedule rows for a newly created credit transaction.
pub(crate) fn insert_installments(
    transaction_id: DatabaseId,
    schedule: &[ScheduledInstallment],
    connection: &Connection,
) -> Result<(), Error> {
    let mut statement = connection.prepare(
        "INSERT INTO installment (transaction_id, number, amount, due_date) \
        VALUES (?1, ?2, ?3, ?4)",
    )?;

    for installment in schedule {
        statement.execute(params![
            transaction_id,
            installment.number,
            installment.amount,
            installment.due_date
        ])?;
    }

    Ok(())
}

/// The state needed to read and pay installments.
#[derive(Debug, Clone)]
pub struct InstallmentState {
    /// The database connection for managing installments.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for InstallmentState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for listing the installments of a credit transaction, in
/// plan order.
pub async fn list_installments_endpoint(
    State(state): State<InstallmentState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<DatabaseId>,
) -> Result<Json<Vec<Installment>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    // Confirm the transaction exists and belongs to the user before listing,
    // so an empty plan and a foreign transaction are distinguishable.
    connection
        .prepare("SELECT id FROM \"transaction\" WHERE id = :id AND user_id = :user_id")?
        .query_row(
            &[(":id", &transaction_id), (":user_id", &user_id.as_i64())],
            |row| row.get::<_, i64>(0),
        )?;

    let installments = connection
        .prepare(
            "SELECT id, transaction_id, number, amount, due_date, paid_date FROM installment \
            WHERE transaction_id = :transaction_id ORDER BY number ASC",
        )?
        .query_map(
            &[(":transaction_id", &transaction_id)],
            map_row_to_installment,
        )?
        .map(|maybe_installment| maybe_installment.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(installments))
}

/// The request body for marking an installment paid.
#[derive(Debug, Default, Deserialize)]
pub struct PayInstallmentData {
    /// The payment date. Defaults to today.
    pub paid_date: Option<Date>,
}

/// A route handler for marking an installment as paid.
///
/// Paying an already-paid installment overwrites the payment date.
pub async fn pay_installment_endpoint(
    State(state): State<InstallmentState>,
    Extension(user_id): Extension<UserID>,
    Path(installment_id): Path<DatabaseId>,
    Json(data): Json<PayInstallmentData>,
) -> Result<Json<Installment>, Error> {
    let paid_date = data
        .paid_date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_updated = connection.execute(
        "UPDATE installment SET paid_date = ?1 \
        WHERE id = ?2 AND transaction_id IN \
            (SELECT id FROM \"transaction\" WHERE user_id = ?3)",
        params![paid_date, installment_id, user_id.as_i64()],
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    let installment = connection
        .prepare(
            "SELECT id, transaction_id, number, amount, due_date, paid_date \
            FROM installment WHERE id = :id",
        )?
        .query_row(&[(":id", &installment_id)], map_row_to_installment)?;

    Ok(Json(installment))
}

#[cfg(test)]
mod schedule_tests {
    use time::macros::date;

    use crate::Error;

    use super::{InstallmentPlan, build_schedule, due_date_with_roll_forward, to_cents};

    fn equal_plan(interest: f64, count: u32) -> InstallmentPlan {
        InstallmentPlan {
            interest,
            count,
            first_due_date: date!(2025 - 01 - 15),
            amounts: None,
        }
    }

    #[test]
    fn equal_split_sums_to_total() {
        let schedule = build_schedule(100.0, &equal_plan(0.0, 3)).unwrap();

        let amounts: Vec<f64> = schedule.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, [33.33, 33.33, 33.34]);

        let total_cents: i64 = schedule.iter().map(|i| to_cents(i.amount)).sum();
        assert_eq!(total_cents, 10_000);
    }

    #[test]
    fn interest_is_added_to_the_financed_total() {
        let schedule = build_schedule(1000.0, &equal_plan(200.0, 4)).unwrap();

        let amounts: Vec<f64> = schedule.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, [300.0, 300.0, 300.0, 300.0]);
    }

    #[test]
    fn due_dates_advance_one_month_at_a_time() {
        let schedule = build_schedule(300.0, &equal_plan(0.0, 3)).unwrap();

        let due_dates: Vec<_> = schedule.iter().map(|i| i.due_date).collect();
        assert_eq!(
            due_dates,
            [
                date!(2025 - 01 - 15),
                date!(2025 - 02 - 15),
                date!(2025 - 03 - 15)
            ]
        );
    }

    #[test]
    fn numbers_are_one_based_and_sequential() {
        let schedule = build_schedule(300.0, &equal_plan(0.0, 3)).unwrap();

        let numbers: Vec<u32> = schedule.iter().map(|i| i.number).collect();
        assert_eq!(numbers, [1, 2, 3]);
    }

    #[test]
    fn custom_amounts_are_used_verbatim() {
        let plan = InstallmentPlan {
            interest: 0.0,
            count: 3,
            first_due_date: date!(2025 - 01 - 15),
            amounts: Some(vec![50.0, 30.0, 20.0]),
        };

        let schedule = build_schedule(100.0, &plan).unwrap();

        let amounts: Vec<f64> = schedule.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, [50.0, 30.0, 20.0]);
    }

    #[test]
    fn custom_amounts_must_sum_to_total() {
        let plan = InstallmentPlan {
            interest: 0.0,
            count: 2,
            first_due_date: date!(2025 - 01 - 15),
            amounts: Some(vec![50.0, 49.99]),
        };

        let result = build_schedule(100.0, &plan);

        assert_eq!(
            result.err(),
            Some(Error::InstallmentSumMismatch {
                want: 10_000,
                got: 9_999
            })
        );
    }

    #[test]
    fn custom_amounts_must_match_count() {
        let plan = InstallmentPlan {
            interest: 0.0,
            count: 3,
            first_due_date: date!(2025 - 01 - 15),
            amounts: Some(vec![50.0, 50.0]),
        };

        let result = build_schedule(100.0, &plan);

        assert_eq!(result.err(), Some(Error::InvalidInstallmentCount(2)));
    }

    #[test]
    fn zero_installments_is_rejected() {
        let result = build_schedule(100.0, &equal_plan(0.0, 0));

        assert_eq!(result.err(), Some(Error::InvalidInstallmentCount(0)));
    }

    #[test]
    fn count_above_maximum_is_rejected() {
        let result = build_schedule(100.0, &equal_plan(0.0, 121));

        assert_eq!(result.err(), Some(Error::InvalidInstallmentCount(121)));
    }

    #[test]
    fn negative_interest_is_rejected() {
        let result = build_schedule(100.0, &equal_plan(-1.0, 2));

        assert_eq!(result.err(), Some(Error::InvalidAmount(-1.0)));
    }

    #[test]
    fn due_day_rolls_forward_past_short_months() {
        // January 31st: February has no 31st, so the second installment
        // rolls forward to March 1st.
        let first_due = date!(2025 - 01 - 31);

        assert_eq!(
            due_date_with_roll_forward(first_due, 0),
            Ok(date!(2025 - 01 - 31))
        );
        assert_eq!(
            due_date_with_roll_forward(first_due, 1),
            Ok(date!(2025 - 03 - 01))
        );
        assert_eq!(
            due_date_with_roll_forward(first_due, 2),
            Ok(date!(2025 - 03 - 31))
        );
    }

    #[test]
    fn due_day_rolls_forward_in_leap_february() {
        let first_due = date!(2024 - 01 - 30);

        // 2024 is a leap year but February still has no 30th.
        assert_eq!(
            due_date_with_roll_forward(first_due, 1),
            Ok(date!(2024 - 03 - 01))
        );
    }

    #[test]
    fn due_dates_cross_year_boundary() {
        let first_due = date!(2025 - 11 - 15);

        assert_eq!(
            due_date_with_roll_forward(first_due, 2),
            Ok(date!(2026 - 01 - 15))
        );
    }

    #[test]
    fn december_due_day_rolls_into_next_year() {
        let first_due = date!(2025 - 10 - 31);

        // Offset 2 targets December 31st (valid); offset 1 targets November
        // 31st which rolls forward to December 1st.
        assert_eq!(
            due_date_with_roll_forward(first_due, 1),
            Ok(date!(2025 - 12 - 01))
        );
        assert_eq!(
            due_date_with_roll_forward(first_due, 2),
            Ok(date!(2025 - 12 - 31))
        );
    }

    #[test]
    fn schedule_past_latest_supported_year_is_rejected() {
        // The second due date would land in the year 10000.
        let plan = InstallmentPlan {
            interest: 0.0,
            count: 2,
            first_due_date: date!(9999 - 12 - 15),
            amounts: None,
        };

        let result = build_schedule(100.0, &plan);

        assert_eq!(result.err(), Some(Error::ScheduleOutOfRange));
    }
}

//! Budgets cap spending per category per month. The summary endpoint
//! compares each budget against the month's actual expenses.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    month::{month_bounds, parse_month},
    transaction::expense_totals_by_category,
    user::UserID,
};

/// A spending cap for one category in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    /// The ID for the budget.
    pub id: DatabaseId,
    /// The spending category the budget applies to.
    pub category: String,
    /// The month the budget applies to, as "YYYY-MM".
    pub month: String,
    /// The spending cap in dollars.
    pub amount: f64,
}

pub(crate) fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            month TEXT NOT NULL,
            amount REAL NOT NULL,
            UNIQUE(user_id, category, month),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_budget(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        category: row.get(1)?,
        month: row.get(2)?,
        amount: row.get(3)?,
    })
}

/// The state needed to manage budgets.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or updating a budget.
#[derive(Debug, Deserialize)]
pub struct BudgetData {
    /// The spending category the budget applies to.
    pub category: String,
    /// The month the budget applies to, as "YYYY-MM".
    pub month: String,
    /// The spending cap in dollars.
    pub amount: f64,
}

fn validate_budget_data(data: &BudgetData) -> Result<(), Error> {
    parse_month(&data.month)?;

    if data.amount <= 0.0 {
        return Err(Error::InvalidAmount(data.amount));
    }

    Ok(())
}

fn map_duplicate_budget(data: &BudgetData) -> impl Fn(rusqlite::Error) -> Error {
    let category = data.category.clone();
    let month = data.month.clone();

    move |error| match error {
        // Code 2067 occurs when a UNIQUE constraint failed.
        rusqlite::Error::SqliteFailure(error, Some(_)) if error.extended_code == 2067 => {
            Error::DuplicateBudget(category.clone(), month.clone())
        }
        error => error.into(),
    }
}

/// A route handler for creating a new budget.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<BudgetData>,
) -> Result<Response, Error> {
    validate_budget_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    connection
        .execute(
            "INSERT INTO budget (user_id, category, month, amount) VALUES (?1, ?2, ?3, ?4)",
            params![user_id.as_i64(), data.category, data.month, data.amount],
        )
        .map_err(map_duplicate_budget(&data))?;

    let budget = Budget {
        id: connection.last_insert_rowid(),
        category: data.category,
        month: data.month,
        amount: data.amount,
    };

    Ok((StatusCode::CREATED, Json(budget)).into_response())
}

/// The query parameters for filtering budgets by month.
#[derive(Debug, Default, Deserialize)]
pub struct BudgetFilter {
    /// Only include budgets for this month, as "YYYY-MM".
    pub month: Option<String>,
}

/// A route handler for listing the user's budgets.
///
/// Optionally filtered to one month, ordered by month then category.
pub async fn list_budgets_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Query(filter): Query<BudgetFilter>,
) -> Result<Json<Vec<Budget>>, Error> {
    if let Some(ref month) = filter.month {
        parse_month(month)?;
    }

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let budgets = match filter.month {
        Some(month) => connection
            .prepare(
                "SELECT id, category, month, amount FROM budget \
                WHERE user_id = :user_id AND month = :month ORDER BY category ASC",
            )?
            .query_map(
                &[
                    (":user_id", &user_id.as_i64() as &dyn rusqlite::ToSql),
                    (":month", &month),
                ],
                map_row_to_budget,
            )?
            .map(|maybe_budget| maybe_budget.map_err(Error::SqlError))
            .collect::<Result<Vec<_>, _>>()?,
        None => connection
            .prepare(
                "SELECT id, category, month, amount FROM budget \
                WHERE user_id = :user_id ORDER BY month DESC, category ASC",
            )?
            .query_map(&[(":user_id", &user_id.as_i64())], map_row_to_budget)?
            .map(|maybe_budget| maybe_budget.map_err(Error::SqlError))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(Json(budgets))
}

/// A route handler for getting a single budget by its ID.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<DatabaseId>,
) -> Result<Json<Budget>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let budget = connection
        .prepare(
            "SELECT id, category, month, amount FROM budget \
            WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            &[(":id", &budget_id), (":user_id", &user_id.as_i64())],
            map_row_to_budget,
        )?;

    Ok(Json(budget))
}

/// A route handler for updating a budget.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<DatabaseId>,
    Json(data): Json<BudgetData>,
) -> Result<Json<Budget>, Error> {
    validate_budget_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_updated = connection
        .execute(
            "UPDATE budget SET category = ?1, month = ?2, amount = ?3 \
            WHERE id = ?4 AND user_id = ?5",
            params![
                data.category,
                data.month,
                data.amount,
                budget_id,
                user_id.as_i64()
            ],
        )
        .map_err(map_duplicate_budget(&data))?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(Json(Budget {
        id: budget_id,
        category: data.category,
        month: data.month,
        amount: data.amount,
    }))
}

/// A route handler for deleting a budget.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<DatabaseId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_deleted = connection.execute(
        "DELETE FROM budget WHERE id = ?1 AND user_id = ?2",
        params![budget_id, user_id.as_i64()],
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// One budget compared against the month's actual spending.
#[derive(Debug, PartialEq, Serialize)]
pub struct BudgetSummaryEntry {
    /// The spending category the budget applies to.
    pub category: String,
    /// The spending cap in dollars.
    pub limit: f64,
    /// The expense total for the category this month.
    pub spent: f64,
    /// How much of the cap is left. Negative when over budget.
    pub remaining: f64,
    /// The share of the cap spent, as a percentage. May exceed 100.
    pub percent_spent: f64,
}

/// The query parameters for the budget summary.
#[derive(Debug, Default, Deserialize)]
pub struct BudgetSummaryParams {
    /// The month to summarize, as "YYYY-MM". Defaults to the current month.
    pub month: Option<String>,
}

/// The budget summary for one month.
#[derive(Debug, Serialize)]
pub struct BudgetSummary {
    /// The month summarized, as "YYYY-MM".
    pub month: String,
    /// One entry per budget in the month, ordered by category.
    pub entries: Vec<BudgetSummaryEntry>,
}

pub(crate) fn current_month_string() -> String {
    let today = OffsetDateTime::now_utc().date();
    format!("{:04}-{:02}", today.year(), today.month() as u8)
}

/// A route handler that compares a month's budgets against its expenses.
pub async fn budget_summary_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Query(params): Query<BudgetSummaryParams>,
) -> Result<Json<BudgetSummary>, Error> {
    let month_string = params.month.unwrap_or_else(current_month_string);
    let (year, month) = parse_month(&month_string)?;
    let (start, end) = month_bounds(year, month);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let budgets = connection
        .prepare(
            "SELECT id, category, month, amount FROM budget \
            WHERE user_id = :user_id AND month = :month ORDER BY category ASC",
        )?
        .query_map(
            &[
                (":user_id", &user_id.as_i64() as &dyn rusqlite::ToSql),
                (":month", &month_string),
            ],
            map_row_to_budget,
        )?
        .map(|maybe_budget| maybe_budget.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    let spent_by_category = expense_totals_by_category(user_id, start, end, &connection)?;

    let entries = budgets
        .into_iter()
        .map(|budget| {
            let spent = spent_by_category
                .iter()
                .find(|(category, _)| *category == budget.category)
                .map(|(_, total)| *total)
                .unwrap_or(0.0);

            let percent_spent = if budget.amount > 0.0 {
                spent / budget.amount * 100.0
            } else {
                0.0
            };

            BudgetSummaryEntry {
                category: budget.category,
                limit: budget.amount,
                spent,
                remaining: budget.amount - spent,
                percent_spent,
            }
        })
        .collect();

    Ok(Json(BudgetSummary {
        month: month_string,
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Json,
        extract::{Path, Query, State},
    };
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        user::{UserID, create_user},
    };

    use super::{
        BudgetData, BudgetFilter, BudgetState, BudgetSummaryParams, budget_summary_endpoint,
        create_budget_endpoint, delete_budget_endpoint, list_budgets_endpoint,
        update_budget_endpoint,
    };

    fn get_test_state() -> BudgetState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("foo@bar.baz", None, &conn).unwrap();

        BudgetState {
            db_connection: Arc::new(Mutex::new(conn)),
        }
    }

    fn budget_data(category: &str, month: &str, amount: f64) -> BudgetData {
        BudgetData {
            category: category.to_owned(),
            month: month.to_owned(),
            amount,
        }
    }

    fn insert_expense(state: &BudgetState, amount: f64, date: &str, category: &str) {
        let conn = state.db_connection.lock().unwrap();
        conn.execute(
            "INSERT INTO \"transaction\" (user_id, amount, date, description, category, kind) \
            VALUES (1, ?1, ?2, '', ?3, 'expense')",
            rusqlite::params![amount, date, category],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn duplicate_category_and_month_is_rejected() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_budget_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(budget_data("groceries", "2025-01", 400.0)),
        )
        .await
        .unwrap();

        let result = create_budget_endpoint(
            State(state),
            Extension(user_id),
            Json(budget_data("groceries", "2025-01", 500.0)),
        )
        .await;

        assert_eq!(
            result.err(),
            Some(Error::DuplicateBudget(
                "groceries".to_owned(),
                "2025-01".to_owned()
            ))
        );
    }

    #[tokio::test]
    async fn same_category_in_another_month_is_allowed() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_budget_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(budget_data("groceries", "2025-01", 400.0)),
        )
        .await
        .unwrap();

        let result = create_budget_endpoint(
            State(state),
            Extension(user_id),
            Json(budget_data("groceries", "2025-02", 400.0)),
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn invalid_month_is_rejected() {
        let state = get_test_state();

        let result = create_budget_endpoint(
            State(state),
            Extension(UserID::new(1)),
            Json(budget_data("groceries", "2025-1", 400.0)),
        )
        .await;

        assert_eq!(result.err(), Some(Error::InvalidMonth("2025-1".to_owned())));
    }

    #[tokio::test]
    async fn nonpositive_amount_is_rejected() {
        let state = get_test_state();

        let result = create_budget_endpoint(
            State(state),
            Extension(UserID::new(1)),
            Json(budget_data("groceries", "2025-01", -5.0)),
        )
        .await;

        assert_eq!(result.err(), Some(Error::InvalidAmount(-5.0)));
    }

    #[tokio::test]
    async fn list_can_filter_by_month() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        for (category, month) in [("groceries", "2025-01"), ("rent", "2025-01"), ("groceries", "2025-02")] {
            create_budget_endpoint(
                State(state.clone()),
                Extension(user_id),
                Json(budget_data(category, month, 100.0)),
            )
            .await
            .unwrap();
        }

        let Json(budgets) = list_budgets_endpoint(
            State(state),
            Extension(user_id),
            Query(BudgetFilter {
                month: Some("2025-01".to_owned()),
            }),
        )
        .await
        .unwrap();

        let categories: Vec<&str> = budgets.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(categories, ["groceries", "rent"]);
    }

    #[tokio::test]
    async fn update_to_existing_budget_is_rejected() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        for category in ["groceries", "rent"] {
            create_budget_endpoint(
                State(state.clone()),
                Extension(user_id),
                Json(budget_data(category, "2025-01", 100.0)),
            )
            .await
            .unwrap();
        }

        let result = update_budget_endpoint(
            State(state),
            Extension(user_id),
            Path(2),
            Json(budget_data("groceries", "2025-01", 100.0)),
        )
        .await;

        assert_eq!(
            result.err(),
            Some(Error::DuplicateBudget(
                "groceries".to_owned(),
                "2025-01".to_owned()
            ))
        );
    }

    #[tokio::test]
    async fn delete_missing_budget_is_not_found() {
        let state = get_test_state();

        let result =
            delete_budget_endpoint(State(state), Extension(UserID::new(1)), Path(42)).await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[tokio::test]
    async fn summary_compares_budgets_to_expenses() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_budget_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(budget_data("groceries", "2025-01", 400.0)),
        )
        .await
        .unwrap();

        insert_expense(&state, 100.0, "2025-01-10", "groceries");
        insert_expense(&state, 200.0, "2025-01-20", "groceries");
        // Outside the month, must not count.
        insert_expense(&state, 999.0, "2025-02-01", "groceries");

        let Json(summary) = budget_summary_endpoint(
            State(state),
            Extension(user_id),
            Query(BudgetSummaryParams {
                month: Some("2025-01".to_owned()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(summary.month, "2025-01");
        assert_eq!(summary.entries.len(), 1);

        let entry = &summary.entries[0];
        assert_eq!(entry.spent, 300.0);
        assert_eq!(entry.remaining, 100.0);
        assert_eq!(entry.percent_spent, 75.0);
    }

    #[tokio::test]
    async fn summary_shows_overspend_past_one_hundred_percent() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_budget_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(budget_data("groceries", "2025-01", 100.0)),
        )
        .await
        .unwrap();

        insert_expense(&state, 150.0, "2025-01-10", "groceries");

        let Json(summary) = budget_summary_endpoint(
            State(state),
            Extension(user_id),
            Query(BudgetSummaryParams {
                month: Some("2025-01".to_owned()),
            }),
        )
        .await
        .unwrap();

        let entry = &summary.entries[0];
        assert_eq!(entry.remaining, -50.0);
        assert_eq!(entry.percent_spent, 150.0);
    }

    #[tokio::test]
    async fn summary_with_no_spending_is_zero_percent() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_budget_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(budget_data("groceries", "2025-01", 400.0)),
        )
        .await
        .unwrap();

        let Json(summary) = budget_summary_endpoint(
            State(state),
            Extension(user_id),
            Query(BudgetSummaryParams {
                month: Some("2025-01".to_owned()),
            }),
        )
        .await
        .unwrap();

        let entry = &summary.entries[0];
        assert_eq!(entry.spent, 0.0);
        assert_eq!(entry.percent_spent, 0.0);
    }
}

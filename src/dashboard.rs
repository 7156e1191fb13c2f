//! The dashboard endpoint aggregates one month of activity into a single
//! summary for the client's home screen.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    account::get_total_account_balance,
    budget::current_month_string,
    investment::get_investment_totals,
    month::{month_bounds, parse_month},
    transaction::{
        TransactionKind, count_unpaid_installments_due, expense_totals_by_category,
        sum_amount_by_kind,
    },
    user::UserID,
};

/// The state needed to build the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading the dashboard data.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for the dashboard.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    /// The month to summarize, as "YYYY-MM". Defaults to the current month.
    pub month: Option<String>,
}

/// The expense total for one category.
#[derive(Debug, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The spending category.
    pub category: String,
    /// The expense total in dollars.
    pub total: f64,
}

/// The user's investment position across all holdings.
#[derive(Debug, PartialEq, Serialize)]
pub struct InvestmentSummary {
    /// The total paid for all holdings, in dollars.
    pub invested: f64,
    /// What all holdings are worth now, in dollars.
    pub current_value: f64,
    /// The overall return as a percentage. Zero when nothing is invested.
    pub return_percent: f64,
}

/// One month of activity summarized for the dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    /// The month summarized, as "YYYY-MM".
    pub month: String,
    /// The income total for the month, in dollars.
    pub income: f64,
    /// The expense total for the month, in dollars.
    pub expenses: f64,
    /// Income minus expenses. Negative when spending exceeded income.
    pub net: f64,
    /// The sum of all account balances, in dollars.
    pub total_account_balance: f64,
    /// The month's expenses per category, largest first.
    pub expenses_by_category: Vec<CategoryTotal>,
    /// The user's investment position.
    pub investments: InvestmentSummary,
    /// How many unpaid installments come due in the month.
    pub unpaid_installments_due: i64,
}

/// A route handler that summarizes a month of activity.
pub async fn dashboard_endpoint(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardSummary>, Error> {
    let month_string = params.month.unwrap_or_else(current_month_string);
    let (year, month) = parse_month(&month_string)?;
    let (start, end) = month_bounds(year, month);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let income = sum_amount_by_kind(user_id, TransactionKind::Income, start, end, &connection)?;
    let expenses = sum_amount_by_kind(user_id, TransactionKind::Expense, start, end, &connection)?;

    let expenses_by_category = expense_totals_by_category(user_id, start, end, &connection)?
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();

    let (invested, current_value) = get_investment_totals(user_id, &connection)?;
    let return_percent = if invested > 0.0 {
        (current_value - invested) / invested * 100.0
    } else {
        0.0
    };

    let summary = DashboardSummary {
        month: month_string,
        income,
        expenses,
        net: income - expenses,
        total_account_balance: get_total_account_balance(user_id, &connection)?,
        expenses_by_category,
        investments: InvestmentSummary {
            invested,
            current_value,
            return_percent,
        },
        unpaid_installments_due: count_unpaid_installments_due(user_id, start, end, &connection)?,
    };

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Json,
        extract::{Query, State},
    };
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        user::{UserID, create_user},
    };

    use super::{DashboardParams, DashboardState, dashboard_endpoint};

    fn get_test_state() -> DashboardState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("foo@bar.baz", None, &conn).unwrap();

        DashboardState {
            db_connection: Arc::new(Mutex::new(conn)),
        }
    }

    fn insert_transaction(state: &DashboardState, amount: f64, date: &str, category: &str, kind: &str) {
        let conn = state.db_connection.lock().unwrap();
        conn.execute(
            "INSERT INTO \"transaction\" (user_id, amount, date, description, category, kind) \
            VALUES (1, ?1, ?2, '', ?3, ?4)",
            rusqlite::params![amount, date, category, kind],
        )
        .unwrap();
    }

    fn january_params() -> Query<DashboardParams> {
        Query(DashboardParams {
            month: Some("2025-01".to_owned()),
        })
    }

    #[tokio::test]
    async fn empty_month_summarizes_to_zeroes() {
        let state = get_test_state();

        let Json(summary) =
            dashboard_endpoint(State(state), Extension(UserID::new(1)), january_params())
                .await
                .unwrap();

        assert_eq!(summary.income, 0.0);
        assert_eq!(summary.expenses, 0.0);
        assert_eq!(summary.net, 0.0);
        assert_eq!(summary.total_account_balance, 0.0);
        assert_eq!(summary.investments.return_percent, 0.0);
        assert_eq!(summary.unpaid_installments_due, 0);
        assert!(summary.expenses_by_category.is_empty());
    }

    #[tokio::test]
    async fn income_and_expenses_produce_net() {
        let state = get_test_state();
        insert_transaction(&state, 3000.0, "2025-01-01", "salary", "income");
        insert_transaction(&state, 1000.0, "2025-01-05", "rent", "expense");
        insert_transaction(&state, 200.0, "2025-01-10", "groceries", "expense");
        // Another month, must not count.
        insert_transaction(&state, 500.0, "2025-02-01", "rent", "expense");

        let Json(summary) =
            dashboard_endpoint(State(state), Extension(UserID::new(1)), january_params())
                .await
                .unwrap();

        assert_eq!(summary.income, 3000.0);
        assert_eq!(summary.expenses, 1200.0);
        assert_eq!(summary.net, 1800.0);

        let categories: Vec<&str> = summary
            .expenses_by_category
            .iter()
            .map(|entry| entry.category.as_str())
            .collect();
        assert_eq!(categories, ["rent", "groceries"]);
    }

    #[tokio::test]
    async fn investment_return_is_a_percentage() {
        let state = get_test_state();
        {
            let conn = state.db_connection.lock().unwrap();
            conn.execute(
                "INSERT INTO investment \
                (user_id, name, kind, amount_invested, current_value, purchase_date) \
                VALUES (1, 'fund', 'fund', 1000.0, 1100.0, '2024-06-01')",
                (),
            )
            .unwrap();
        }

        let Json(summary) =
            dashboard_endpoint(State(state), Extension(UserID::new(1)), january_params())
                .await
                .unwrap();

        assert_eq!(summary.investments.invested, 1000.0);
        assert_eq!(summary.investments.current_value, 1100.0);
        assert!((summary.investments.return_percent - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn counts_unpaid_installments_due_in_month() {
        let state = get_test_state();
        insert_transaction(&state, 300.0, "2024-12-01", "tv", "credit");
        {
            let conn = state.db_connection.lock().unwrap();
            // The December installment is overdue but outside the month, so
            // only the unpaid January one counts.
            conn.execute(
                "INSERT INTO installment (transaction_id, number, amount, due_date, paid_date) \
                VALUES (1, 1, 100.0, '2024-12-10', NULL), \
                       (1, 2, 100.0, '2025-01-10', NULL), \
                       (1, 3, 100.0, '2025-01-20', '2025-01-19'), \
                       (1, 4, 100.0, '2025-03-10', NULL)",
                (),
            )
            .unwrap();
        }

        let Json(summary) =
            dashboard_endpoint(State(state), Extension(UserID::new(1)), january_params())
                .await
                .unwrap();

        assert_eq!(summary.unpaid_installments_due, 1);
    }

    #[tokio::test]
    async fn invalid_month_is_rejected() {
        let state = get_test_state();

        let result = dashboard_endpoint(
            State(state),
            Extension(UserID::new(1)),
            Query(DashboardParams {
                month: Some("nope".to_owned()),
            }),
        )
        .await;

        assert_eq!(result.err(), Some(Error::InvalidMonth("nope".to_owned())));
    }
}

//! Defines the CRUD endpoints for transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, ToSql, Transaction as SqlTransaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error, database_id::DatabaseId,
    pagination::{PaginationConfig, PaginationParams},
    user::UserID,
};

use super::installment::{
    Installment, InstallmentPlan, build_schedule, insert_installments, map_row_to_installment,
    to_cents,
};
use super::models::{TRANSACTION_COLUMNS, Transaction, TransactionKind, map_row_to_transaction};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls paging of the transaction list.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The request body for creating a transaction.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionData {
    /// The amount of money in dollars. For credit transactions this is the
    /// principal, before interest.
    pub amount: f64,
    /// When the transaction happened. Must not be in the future.
    pub date: Date,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// The category used for budget aggregation.
    pub category: String,
    /// Whether this is income, an expense, or a credit purchase.
    pub kind: TransactionKind,
    /// The account the money moved through, if any.
    #[serde(default)]
    pub account_id: Option<DatabaseId>,
    /// How to split a credit purchase into installments.
    ///
    /// Required for credit transactions, not allowed otherwise.
    #[serde(default)]
    pub installment_plan: Option<InstallmentPlan>,
}

/// The response for a created transaction.
///
/// For credit transactions this includes the generated installment schedule.
#[derive(Debug, Serialize)]
pub struct CreateTransactionResponse {
    /// The created transaction.
    #[serde(flatten)]
    pub transaction: Transaction,
    /// The installment schedule, empty for non-credit transactions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub installments: Vec<Installment>,
}

fn validate_amount_and_date(amount: f64, date: Date) -> Result<(), Error> {
    if amount <= 0.0 {
        return Err(Error::InvalidAmount(amount));
    }

    if date > OffsetDateTime::now_utc().date() {
        return Err(Error::FutureDate(date));
    }

    Ok(())
}

/// A route handler for creating a new transaction.
///
/// Credit transactions must include an installment plan, which is expanded
/// into installment rows in the same request.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<CreateTransactionData>,
) -> Result<Response, Error> {
    validate_amount_and_date(data.amount, data.date)?;

    let schedule = match (data.kind, &data.installment_plan) {
        (TransactionKind::Credit, Some(plan)) => Some(build_schedule(data.amount, plan)?),
        (TransactionKind::Credit, None) => return Err(Error::InstallmentPlanRequired),
        (_, Some(_)) => return Err(Error::InstallmentPlanNotAllowed),
        (_, None) => None,
    };

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    // The transaction row and its installment rows land together or not at
    // all, otherwise a failed installment insert would leave a credit
    // transaction with a partial schedule.
    let db_transaction =
        SqlTransaction::new_unchecked(&connection, TransactionBehavior::Deferred)?;

    db_transaction.execute(
        "INSERT INTO \"transaction\" (user_id, amount, date, description, category, kind, account_id) \
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id.as_i64(),
            data.amount,
            data.date,
            data.description,
            data.category,
            data.kind.as_str(),
            data.account_id
        ],
    )?;

    let transaction_id = db_transaction.last_insert_rowid();

    let installments = match schedule {
        Some(schedule) => {
            insert_installments(transaction_id, &schedule, &db_transaction)?;
            get_installments(transaction_id, &db_transaction)?
        }
        None => Vec::new(),
    };

    db_transaction.commit()?;

    let response = CreateTransactionResponse {
        transaction: Transaction {
            id: transaction_id,
            amount: data.amount,
            date: data.date,
            description: data.description,
            category: data.category,
            kind: data.kind,
            account_id: data.account_id,
        },
        installments,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

fn get_installments(
    transaction_id: DatabaseId,
    connection: &Connection,
) -> Result<Vec<Installment>, Error> {
    connection
        .prepare(
            "SELECT id, transaction_id, number, amount, due_date, paid_date FROM installment \
            WHERE transaction_id = :transaction_id ORDER BY number ASC",
        )?
        .query_map(
            &[(":transaction_id", &transaction_id)],
            map_row_to_installment,
        )?
        .map(|maybe_installment| maybe_installment.map_err(Error::SqlError))
        .collect()
}

/// The query parameters for filtering and paging the transaction list.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    /// Only include transactions on or after this date.
    pub from: Option<Date>,
    /// Only include transactions on or before this date.
    pub to: Option<Date>,
    /// Only include transactions in this category.
    pub category: Option<String>,
    /// Only include transactions of this kind.
    pub kind: Option<TransactionKind>,
    /// The one-based page number.
    pub page: Option<u64>,
    /// The number of rows per page.
    pub per_page: Option<u64>,
}

/// A route handler for listing the user's transactions, newest first.
///
/// Supports filtering by date range, category, and kind, and is paged.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let pagination = PaginationParams {
        page: filter.page,
        per_page: filter.per_page,
    };
    let (limit, offset) = pagination.to_limit_offset(&state.pagination_config);
    let limit = limit as i64;
    let offset = offset as i64;

    let user_id = user_id.as_i64();
    let mut sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE user_id = :user_id"
    );
    let mut params: Vec<(&str, &dyn ToSql)> = vec![(":user_id", &user_id)];

    if let Some(ref from) = filter.from {
        sql.push_str(" AND date >= :from");
        params.push((":from", from));
    }

    if let Some(ref to) = filter.to {
        sql.push_str(" AND date <= :to");
        params.push((":to", to));
    }

    if let Some(ref category) = filter.category {
        sql.push_str(" AND category = :category");
        params.push((":category", category));
    }

    let kind_name = filter.kind.map(|kind| kind.as_str());
    if let Some(ref kind_name) = kind_name {
        sql.push_str(" AND kind = :kind");
        params.push((":kind", kind_name));
    }

    sql.push_str(" ORDER BY date DESC, id DESC LIMIT :limit OFFSET :offset");
    params.push((":limit", &limit));
    params.push((":offset", &offset));

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = connection
        .prepare(&sql)?
        .query_map(params.as_slice(), map_row_to_transaction)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(transactions))
}

/// A route handler for getting a single transaction by its ID.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<DatabaseId>,
) -> Result<Json<Transaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = get_transaction(user_id, transaction_id, &connection)?;

    Ok(Json(transaction))
}

fn get_transaction(
    user_id: UserID,
    transaction_id: DatabaseId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" \
            WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &transaction_id), (":user_id", &user_id.as_i64())],
            map_row_to_transaction,
        )?;

    Ok(transaction)
}

/// The request body for updating a transaction.
///
/// The kind and installment plan are fixed at creation, delete and recreate
/// the transaction to change them.
#[derive(Debug, Deserialize)]
pub struct UpdateTransactionData {
    /// The amount of money in dollars.
    pub amount: f64,
    /// When the transaction happened. Must not be in the future.
    pub date: Date,
    /// A text description of what the transaction was for.
    #[serde(default)]
    pub description: String,
    /// The category used for budget aggregation.
    pub category: String,
    /// The account the money moved through, if any.
    #[serde(default)]
    pub account_id: Option<DatabaseId>,
}

/// A route handler for updating a transaction's details.
///
/// The amount of a credit transaction cannot change, the installment
/// schedule is derived from it.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<DatabaseId>,
    Json(data): Json<UpdateTransactionData>,
) -> Result<Json<Transaction>, Error> {
    validate_amount_and_date(data.amount, data.date)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let existing = get_transaction(user_id, transaction_id, &connection)?;
    if existing.kind == TransactionKind::Credit
        && to_cents(data.amount) != to_cents(existing.amount)
    {
        return Err(Error::CreditAmountImmutable);
    }

    let rows_updated = connection.execute(
        "UPDATE \"transaction\" \
        SET amount = ?1, date = ?2, description = ?3, category = ?4, account_id = ?5 \
        WHERE id = ?6 AND user_id = ?7",
        params![
            data.amount,
            data.date,
            data.description,
            data.category,
            data.account_id,
            transaction_id,
            user_id.as_i64()
        ],
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    let transaction = get_transaction(user_id, transaction_id, &connection)?;

    Ok(Json(transaction))
}

/// A route handler for deleting a transaction.
///
/// Deleting a credit transaction also deletes its installments.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<DatabaseId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_deleted = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        params![transaction_id, user_id.as_i64()],
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

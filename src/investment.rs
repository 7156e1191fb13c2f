//! Investments track money put into assets and what those assets are worth
//! now.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, params, types::Type};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{AppState, Error, database_id::DatabaseId, user::UserID};

/// The asset class of an investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentKind {
    /// Shares in a single company.
    Stock,
    /// A managed or index fund.
    Fund,
    /// Cryptocurrency.
    Crypto,
    /// Bonds, term deposits, and other fixed-income assets.
    FixedIncome,
}

impl InvestmentKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            InvestmentKind::Stock => "stock",
            InvestmentKind::Fund => "fund",
            InvestmentKind::Crypto => "crypto",
            InvestmentKind::FixedIncome => "fixed_income",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "stock" => Some(InvestmentKind::Stock),
            "fund" => Some(InvestmentKind::Fund),
            "crypto" => Some(InvestmentKind::Crypto),
            "fixed_income" => Some(InvestmentKind::FixedIncome),
            _ => None,
        }
    }
}

/// An investment holding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Investment {
    /// The ID for the investment.
    pub id: DatabaseId,
    /// The investment name, e.g. a ticker or fund name.
    pub name: String,
    /// The asset class.
    pub kind: InvestmentKind,
    /// The amount paid for the holding, in dollars.
    pub amount_invested: f64,
    /// What the holding is worth now, in dollars.
    pub current_value: f64,
    /// When the holding was purchased.
    pub purchase_date: Date,
}

pub(crate) fn create_investment_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS investment (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            amount_invested REAL NOT NULL,
            current_value REAL NOT NULL,
            purchase_date TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_investment(row: &Row) -> Result<Investment, rusqlite::Error> {
    let raw_kind: String = row.get(2)?;
    let kind = InvestmentKind::from_name(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown investment kind \"{raw_kind}\"").into(),
        )
    })?;

    Ok(Investment {
        id: row.get(0)?,
        name: row.get(1)?,
        kind,
        amount_invested: row.get(3)?,
        current_value: row.get(4)?,
        purchase_date: row.get(5)?,
    })
}

const INVESTMENT_COLUMNS: &str = "id, name, kind, amount_invested, current_value, purchase_date";

/// The sum of what the user paid for their investments and what the holdings
/// are worth now, both zero when there are none.
pub(crate) fn get_investment_totals(
    user_id: UserID,
    connection: &Connection,
) -> Result<(f64, f64), Error> {
    let totals = connection
        .prepare(
            "SELECT COALESCE(SUM(amount_invested), 0.0), COALESCE(SUM(current_value), 0.0) \
            FROM investment WHERE user_id = :user_id",
        )?
        .query_row(&[(":user_id", &user_id.as_i64())], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;

    Ok(totals)
}

/// The state needed to manage investments.
#[derive(Debug, Clone)]
pub struct InvestmentState {
    /// The database connection for managing investments.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for InvestmentState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or updating an investment.
#[derive(Debug, Deserialize)]
pub struct InvestmentData {
    /// The investment name.
    pub name: String,
    /// The asset class.
    pub kind: InvestmentKind,
    /// The amount paid for the holding, in dollars.
    pub amount_invested: f64,
    /// What the holding is worth now, in dollars.
    pub current_value: f64,
    /// When the holding was purchased.
    pub purchase_date: Date,
}

fn validate_investment_data(data: &InvestmentData) -> Result<(), Error> {
    if data.amount_invested <= 0.0 {
        return Err(Error::InvalidAmount(data.amount_invested));
    }

    // Holdings can lose value but a negative valuation is nonsense.
    if data.current_value < 0.0 {
        return Err(Error::InvalidAmount(data.current_value));
    }

    if data.purchase_date > OffsetDateTime::now_utc().date() {
        return Err(Error::FutureDate(data.purchase_date));
    }

    Ok(())
}

/// A route handler for creating a new investment.
pub async fn create_investment_endpoint(
    State(state): State<InvestmentState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<InvestmentData>,
) -> Result<Response, Error> {
    validate_investment_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    connection.execute(
        "INSERT INTO investment \
        (user_id, name, kind, amount_invested, current_value, purchase_date) \
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id.as_i64(),
            data.name,
            data.kind.as_str(),
            data.amount_invested,
            data.current_value,
            data.purchase_date
        ],
    )?;

    let investment = Investment {
        id: connection.last_insert_rowid(),
        name: data.name,
        kind: data.kind,
        amount_invested: data.amount_invested,
        current_value: data.current_value,
        purchase_date: data.purchase_date,
    };

    Ok((StatusCode::CREATED, Json(investment)).into_response())
}

/// A route handler for listing the user's investments, ordered by name.
pub async fn list_investments_endpoint(
    State(state): State<InvestmentState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Investment>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let investments = connection
        .prepare(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investment \
            WHERE user_id = :user_id ORDER BY name ASC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row_to_investment)?
        .map(|maybe_investment| maybe_investment.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(investments))
}

/// A route handler for getting a single investment by its ID.
pub async fn get_investment_endpoint(
    State(state): State<InvestmentState>,
    Extension(user_id): Extension<UserID>,
    Path(investment_id): Path<DatabaseId>,
) -> Result<Json<Investment>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let investment = connection
        .prepare(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investment \
            WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &investment_id), (":user_id", &user_id.as_i64())],
            map_row_to_investment,
        )?;

    Ok(Json(investment))
}

/// A route handler for updating an investment, typically to refresh its
/// current value.
pub async fn update_investment_endpoint(
    State(state): State<InvestmentState>,
    Extension(user_id): Extension<UserID>,
    Path(investment_id): Path<DatabaseId>,
    Json(data): Json<InvestmentData>,
) -> Result<Json<Investment>, Error> {
    validate_investment_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_updated = connection.execute(
        "UPDATE investment \
        SET name = ?1, kind = ?2, amount_invested = ?3, current_value = ?4, purchase_date = ?5 \
        WHERE id = ?6 AND user_id = ?7",
        params![
            data.name,
            data.kind.as_str(),
            data.amount_invested,
            data.current_value,
            data.purchase_date,
            investment_id,
            user_id.as_i64()
        ],
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(Json(Investment {
        id: investment_id,
        name: data.name,
        kind: data.kind,
        amount_invested: data.amount_invested,
        current_value: data.current_value,
        purchase_date: data.purchase_date,
    }))
}

/// A route handler for deleting an investment.
pub async fn delete_investment_endpoint(
    State(state): State<InvestmentState>,
    Extension(user_id): Extension<UserID>,
    Path(investment_id): Path<DatabaseId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_deleted = connection.execute(
        "DELETE FROM investment WHERE id = ?1 AND user_id = ?2",
        params![investment_id, user_id.as_i64()],
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

//! Savings goals track progress towards a target amount, e.g. a holiday or
//! an emergency fund.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{AppState, Error, database_id::DatabaseId, user::UserID};

/// A savings goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    /// The ID for the goal.
    pub id: DatabaseId,
    /// The goal name, e.g. "emergency fund".
    pub name: String,
    /// The amount being saved towards, in dollars.
    pub target_amount: f64,
    /// The amount saved so far, in dollars.
    pub saved_amount: f64,
    /// When the goal should be reached, if a deadline was set.
    pub deadline: Option<Date>,
}

impl Goal {
    /// The share of the target saved so far, as a percentage capped at 100.
    fn percent_complete(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 0.0;
        }

        (self.saved_amount / self.target_amount * 100.0).min(100.0)
    }
}

/// A goal as returned by the API, with its progress included.
#[derive(Debug, Serialize)]
pub struct GoalResponse {
    /// The goal.
    #[serde(flatten)]
    pub goal: Goal,
    /// The share of the target saved so far, as a percentage capped at 100.
    pub percent_complete: f64,
}

impl From<Goal> for GoalResponse {
    fn from(goal: Goal) -> Self {
        let percent_complete = goal.percent_complete();
        Self {
            goal,
            percent_complete,
        }
    }
}

pub(crate) fn create_goal_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS goal (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            target_amount REAL NOT NULL,
            saved_amount REAL NOT NULL DEFAULT 0.0,
            deadline TEXT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_goal(row: &Row) -> Result<Goal, rusqlite::Error> {
    Ok(Goal {
        id: row.get(0)?,
        name: row.get(1)?,
        target_amount: row.get(2)?,
        saved_amount: row.get(3)?,
        deadline: row.get(4)?,
    })
}

const GOAL_COLUMNS: &str = "id, name, target_amount, saved_amount, deadline";

/// The state needed to manage savings goals.
#[derive(Debug, Clone)]
pub struct GoalState {
    /// The database connection for managing goals.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GoalState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or updating a savings goal.
#[derive(Debug, Deserialize)]
pub struct GoalData {
    /// The goal name.
    pub name: String,
    /// The amount being saved towards, in dollars.
    pub target_amount: f64,
    /// The amount saved so far, in dollars. Defaults to zero.
    #[serde(default)]
    pub saved_amount: f64,
    /// When the goal should be reached, if there is a deadline.
    #[serde(default)]
    pub deadline: Option<Date>,
}

fn validate_goal_data(data: &GoalData) -> Result<(), Error> {
    if data.target_amount <= 0.0 {
        return Err(Error::InvalidAmount(data.target_amount));
    }

    if data.saved_amount < 0.0 {
        return Err(Error::InvalidAmount(data.saved_amount));
    }

    Ok(())
}

/// A route handler for creating a new savings goal.
pub async fn create_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<GoalData>,
) -> Result<Response, Error> {
    validate_goal_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    connection.execute(
        "INSERT INTO goal (user_id, name, target_amount, saved_amount, deadline) \
        VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id.as_i64(),
            data.name,
            data.target_amount,
            data.saved_amount,
            data.deadline
        ],
    )?;

    let goal = Goal {
        id: connection.last_insert_rowid(),
        name: data.name,
        target_amount: data.target_amount,
        saved_amount: data.saved_amount,
        deadline: data.deadline,
    };

    Ok((StatusCode::CREATED, Json(GoalResponse::from(goal))).into_response())
}

/// A route handler for listing the user's savings goals, ordered by name.
pub async fn list_goals_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<GoalResponse>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let goals = connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goal WHERE user_id = :user_id ORDER BY name ASC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row_to_goal)?
        .map(|maybe_goal| {
            maybe_goal
                .map(GoalResponse::from)
                .map_err(Error::SqlError)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(goals))
}

fn get_goal(
    user_id: UserID,
    goal_id: DatabaseId,
    connection: &Connection,
) -> Result<Goal, Error> {
    let goal = connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goal WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &goal_id), (":user_id", &user_id.as_i64())],
            map_row_to_goal,
        )?;

    Ok(goal)
}

/// A route handler for getting a single savings goal by its ID.
pub async fn get_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<DatabaseId>,
) -> Result<Json<GoalResponse>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let goal = get_goal(user_id, goal_id, &connection)?;

    Ok(Json(GoalResponse::from(goal)))
}

/// A route handler for updating a savings goal.
pub async fn update_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<DatabaseId>,
    Json(data): Json<GoalData>,
) -> Result<Json<GoalResponse>, Error> {
    validate_goal_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_updated = connection.execute(
        "UPDATE goal SET name = ?1, target_amount = ?2, saved_amount = ?3, deadline = ?4 \
        WHERE id = ?5 AND user_id = ?6",
        params![
            data.name,
            data.target_amount,
            data.saved_amount,
            data.deadline,
            goal_id,
            user_id.as_i64()
        ],
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    let goal = Goal {
        id: goal_id,
        name: data.name,
        target_amount: data.target_amount,
        saved_amount: data.saved_amount,
        deadline: data.deadline,
    };

    Ok(Json(GoalResponse::from(goal)))
}

/// A route handler for deleting a savings goal.
pub async fn delete_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<DatabaseId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_deleted = connection.execute(
        "DELETE FROM goal WHERE id = ?1 AND user_id = ?2",
        params![goal_id, user_id.as_i64()],
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// The request body for contributing to a savings goal.
#[derive(Debug, Deserialize)]
pub struct ContributionData {
    /// The amount to add to the goal's savings, in dollars.
    pub amount: f64,
}

/// A route handler for adding a contribution to a savings goal.
///
/// Contributions may push the saved amount past the target, the progress
/// percentage is simply capped at 100.
pub async fn contribute_to_goal_endpoint(
    State(state): State<GoalState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<DatabaseId>,
    Json(data): Json<ContributionData>,
) -> Result<Json<GoalResponse>, Error> {
    if data.amount <= 0.0 {
        return Err(Error::InvalidAmount(data.amount));
    }

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_updated = connection.execute(
        "UPDATE goal SET saved_amount = saved_amount + ?1 WHERE id = ?2 AND user_id = ?3",
        params![data.amount, goal_id, user_id.as_i64()],
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    let goal = get_goal(user_id, goal_id, &connection)?;

    Ok(Json(GoalResponse::from(goal)))
}

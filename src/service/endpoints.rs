//! Defines the CRUD endpoints for recurring services and their payment
//! history.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, params};
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error, database_id::DatabaseId, month::parse_month, user::UserID,
};

use super::core::{
    SERVICE_COLUMNS, Service, ServiceHistory, map_row_to_history, map_row_to_service,
};

/// The state needed to manage services.
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// The database connection for managing services.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ServiceState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating or updating a service.
#[derive(Debug, Deserialize)]
pub struct ServiceData {
    /// The service name.
    pub name: String,
    /// The expected monthly amount in dollars.
    pub amount: f64,
    /// The day of the month the bill is due, 1-31.
    pub due_day: u8,
    /// Whether the service is still being billed.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn validate_service_data(data: &ServiceData) -> Result<(), Error> {
    if data.amount <= 0.0 {
        return Err(Error::InvalidAmount(data.amount));
    }

    if !(1..=31).contains(&data.due_day) {
        return Err(Error::InvalidDueDay(data.due_day));
    }

    Ok(())
}

/// A route handler for creating a new recurring service.
pub async fn create_service_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
    Json(data): Json<ServiceData>,
) -> Result<Response, Error> {
    validate_service_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    connection.execute(
        "INSERT INTO service (user_id, name, amount, due_day, active) \
        VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id.as_i64(),
            data.name,
            data.amount,
            data.due_day,
            data.active
        ],
    )?;

    let service = Service {
        id: connection.last_insert_rowid(),
        name: data.name,
        amount: data.amount,
        due_day: data.due_day,
        active: data.active,
    };

    Ok((StatusCode::CREATED, Json(service)).into_response())
}

/// A route handler for listing the user's services, ordered by name.
///
/// Includes inactive services so they can be reactivated.
pub async fn list_services_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Service>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let services = connection
        .prepare(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service \
            WHERE user_id = :user_id ORDER BY name ASC"
        ))?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row_to_service)?
        .map(|maybe_service| maybe_service.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(services))
}

/// A route handler for getting a single service by its ID.
pub async fn get_service_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
    Path(service_id): Path<DatabaseId>,
) -> Result<Json<Service>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let service = get_service(user_id, service_id, &connection)?;

    Ok(Json(service))
}

fn get_service(
    user_id: UserID,
    service_id: DatabaseId,
    connection: &Connection,
) -> Result<Service, Error> {
    let service = connection
        .prepare(&format!(
            "SELECT {SERVICE_COLUMNS} FROM service WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &service_id), (":user_id", &user_id.as_i64())],
            map_row_to_service,
        )?;

    Ok(service)
}

/// A route handler for updating a service, including toggling it active or
/// inactive.
pub async fn update_service_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
    Path(service_id): Path<DatabaseId>,
    Json(data): Json<ServiceData>,
) -> Result<Json<Service>, Error> {
    validate_service_data(&data)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_updated = connection.execute(
        "UPDATE service SET name = ?1, amount = ?2, due_day = ?3, active = ?4 \
        WHERE id = ?5 AND user_id = ?6",
        params![
            data.name,
            data.amount,
            data.due_day,
            data.active,
            service_id,
            user_id.as_i64()
        ],
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(Json(Service {
        id: service_id,
        name: data.name,
        amount: data.amount,
        due_day: data.due_day,
        active: data.active,
    }))
}

/// A route handler for deleting a service and its payment history.
pub async fn delete_service_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
    Path(service_id): Path<DatabaseId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let rows_deleted = connection.execute(
        "DELETE FROM service WHERE id = ?1 AND user_id = ?2",
        params![service_id, user_id.as_i64()],
    )?;

    if rows_deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for listing a service's payment history, newest month
/// first.
pub async fn list_service_history_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
    Path(service_id): Path<DatabaseId>,
) -> Result<Json<Vec<ServiceHistory>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    // Confirm the service exists and belongs to the user first, so an empty
    // history and a foreign service are distinguishable.
    get_service(user_id, service_id, &connection)?;

    let history = connection
        .prepare(
            "SELECT id, service_id, month, amount, paid_date FROM service_history \
            WHERE service_id = :service_id ORDER BY month DESC",
        )?
        .query_map(&[(":service_id", &service_id)], map_row_to_history)?
        .map(|maybe_entry| maybe_entry.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(history))
}

/// The request body for recording a service payment.
#[derive(Debug, Deserialize)]
pub struct ServicePaymentData {
    /// The month the payment covers, as "YYYY-MM".
    pub month: String,
    /// The amount paid. Defaults to the service's expected amount.
    #[serde(default)]
    pub amount: Option<f64>,
    /// When the payment was made. Defaults to today.
    #[serde(default)]
    pub paid_date: Option<Date>,
}

/// A route handler for recording that a service was paid for a month.
///
/// Each service can only be paid once per month.
pub async fn record_service_payment_endpoint(
    State(state): State<ServiceState>,
    Extension(user_id): Extension<UserID>,
    Path(service_id): Path<DatabaseId>,
    Json(data): Json<ServicePaymentData>,
) -> Result<Response, Error> {
    parse_month(&data.month)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let service = get_service(user_id, service_id, &connection)?;

    let amount = data.amount.unwrap_or(service.amount);
    if amount <= 0.0 {
        return Err(Error::InvalidAmount(amount));
    }

    let paid_date = data
        .paid_date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    connection
        .execute(
            "INSERT INTO service_history (service_id, month, amount, paid_date) \
            VALUES (?1, ?2, ?3, ?4)",
            params![service_id, data.month, amount, paid_date],
        )
        .map_err(|error| match error {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(error, Some(_)) if error.extended_code == 2067 => {
                Error::DuplicateServicePayment(data.month.clone())
            }
            error => error.into(),
        })?;

    let entry = ServiceHistory {
        id: connection.last_insert_rowid(),
        service_id,
        month: data.month,
        amount,
        paid_date,
    };

    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Json,
        extract::{Path, State},
    };
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        db::initialize,
        user::{UserID, create_user},
    };

    use super::{
        ServiceData, ServicePaymentData, ServiceState, create_service_endpoint,
        delete_service_endpoint, get_service_endpoint, list_service_history_endpoint,
        list_services_endpoint, record_service_payment_endpoint, update_service_endpoint,
    };

    fn get_test_state() -> ServiceState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        create_user("foo@bar.baz", None, &conn).unwrap();

        ServiceState {
            db_connection: Arc::new(Mutex::new(conn)),
        }
    }

    fn service_data(name: &str, due_day: u8) -> ServiceData {
        ServiceData {
            name: name.to_owned(),
            amount: 80.0,
            due_day,
            active: true,
        }
    }

    fn payment_data(month: &str) -> ServicePaymentData {
        ServicePaymentData {
            month: month.to_owned(),
            amount: None,
            paid_date: Some(date!(2025 - 01 - 10)),
        }
    }

    #[tokio::test]
    async fn can_create_and_get_service() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();

        let Json(service) = get_service_endpoint(State(state), Extension(user_id), Path(1))
            .await
            .unwrap();

        assert_eq!(service.name, "electricity");
        assert_eq!(service.due_day, 10);
        assert!(service.active);
    }

    #[tokio::test]
    async fn due_day_zero_is_rejected() {
        let state = get_test_state();

        let result = create_service_endpoint(
            State(state),
            Extension(UserID::new(1)),
            Json(service_data("electricity", 0)),
        )
        .await;

        assert_eq!(result.err(), Some(Error::InvalidDueDay(0)));
    }

    #[tokio::test]
    async fn due_day_past_thirty_one_is_rejected() {
        let state = get_test_state();

        let result = create_service_endpoint(
            State(state),
            Extension(UserID::new(1)),
            Json(service_data("electricity", 32)),
        )
        .await;

        assert_eq!(result.err(), Some(Error::InvalidDueDay(32)));
    }

    #[tokio::test]
    async fn update_can_deactivate_service() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("gym", 1)),
        )
        .await
        .unwrap();

        let mut data = service_data("gym", 1);
        data.active = false;

        let Json(service) =
            update_service_endpoint(State(state), Extension(user_id), Path(1), Json(data))
                .await
                .unwrap();

        assert!(!service.active);
    }

    #[tokio::test]
    async fn list_includes_inactive_services() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();

        let mut inactive = service_data("old gym", 1);
        inactive.active = false;
        create_service_endpoint(State(state.clone()), Extension(user_id), Json(inactive))
            .await
            .unwrap();

        let Json(services) = list_services_endpoint(State(state), Extension(user_id))
            .await
            .unwrap();

        assert_eq!(services.len(), 2);
    }

    #[tokio::test]
    async fn payment_defaults_to_service_amount() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();

        record_service_payment_endpoint(
            State(state.clone()),
            Extension(user_id),
            Path(1),
            Json(payment_data("2025-01")),
        )
        .await
        .unwrap();

        let Json(history) =
            list_service_history_endpoint(State(state), Extension(user_id), Path(1))
                .await
                .unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 80.0);
        assert_eq!(history[0].month, "2025-01");
    }

    #[tokio::test]
    async fn second_payment_for_month_is_rejected() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();

        record_service_payment_endpoint(
            State(state.clone()),
            Extension(user_id),
            Path(1),
            Json(payment_data("2025-01")),
        )
        .await
        .unwrap();

        let result = record_service_payment_endpoint(
            State(state),
            Extension(user_id),
            Path(1),
            Json(payment_data("2025-01")),
        )
        .await;

        assert_eq!(
            result.err(),
            Some(Error::DuplicateServicePayment("2025-01".to_owned()))
        );
    }

    #[tokio::test]
    async fn invalid_month_is_rejected() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();

        let result = record_service_payment_endpoint(
            State(state),
            Extension(user_id),
            Path(1),
            Json(payment_data("January 2025")),
        )
        .await;

        assert_eq!(
            result.err(),
            Some(Error::InvalidMonth("January 2025".to_owned()))
        );
    }

    #[tokio::test]
    async fn history_is_newest_month_first() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();

        for month in ["2025-01", "2025-03", "2025-02"] {
            record_service_payment_endpoint(
                State(state.clone()),
                Extension(user_id),
                Path(1),
                Json(payment_data(month)),
            )
            .await
            .unwrap();
        }

        let Json(history) =
            list_service_history_endpoint(State(state), Extension(user_id), Path(1))
                .await
                .unwrap();

        let months: Vec<&str> = history.iter().map(|entry| entry.month.as_str()).collect();
        assert_eq!(months, ["2025-03", "2025-02", "2025-01"]);
    }

    #[tokio::test]
    async fn delete_removes_service_and_history() {
        let state = get_test_state();
        let user_id = UserID::new(1);

        create_service_endpoint(
            State(state.clone()),
            Extension(user_id),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();
        record_service_payment_endpoint(
            State(state.clone()),
            Extension(user_id),
            Path(1),
            Json(payment_data("2025-01")),
        )
        .await
        .unwrap();

        delete_service_endpoint(State(state.clone()), Extension(user_id), Path(1))
            .await
            .unwrap();

        let conn = state.db_connection.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM service_history", (), |row| row.get(0))
            .unwrap();

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn users_cannot_pay_each_others_services() {
        let state = get_test_state();
        {
            let conn = state.db_connection.lock().unwrap();
            create_user("other@bar.baz", None, &conn).unwrap();
        }

        create_service_endpoint(
            State(state.clone()),
            Extension(UserID::new(1)),
            Json(service_data("electricity", 10)),
        )
        .await
        .unwrap();

        let result = record_service_payment_endpoint(
            State(state),
            Extension(UserID::new(2)),
            Path(1),
            Json(payment_data("2025-01")),
        )
        .await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }
}

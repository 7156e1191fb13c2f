//! Assembles the API routes into the application router.

use axum::{
    Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    AppState, Error,
    account::{
        create_account_endpoint, delete_account_endpoint, get_account_endpoint,
        list_accounts_endpoint, update_account_endpoint,
    },
    auth::{
        AuthState, auth_guard, log_in_endpoint, log_out_endpoint, me_endpoint,
        oauth_callback_endpoint, oauth_start_endpoint, register_endpoint,
    },
    budget::{
        budget_summary_endpoint, create_budget_endpoint, delete_budget_endpoint,
        get_budget_endpoint, list_budgets_endpoint, update_budget_endpoint,
    },
    calendar::calendar_endpoint,
    dashboard::dashboard_endpoint,
    diagnostics::{health_endpoint, root_endpoint},
    endpoints,
    goal::{
        contribute_to_goal_endpoint, create_goal_endpoint, delete_goal_endpoint,
        get_goal_endpoint, list_goals_endpoint, update_goal_endpoint,
    },
    investment::{
        create_investment_endpoint, delete_investment_endpoint, get_investment_endpoint,
        list_investments_endpoint, update_investment_endpoint,
    },
    service::{
        create_service_endpoint, delete_service_endpoint, get_service_endpoint,
        list_service_history_endpoint, list_services_endpoint, record_service_payment_endpoint,
        update_service_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_installments_endpoint, list_transactions_endpoint, pay_installment_endpoint,
        update_transaction_endpoint,
    },
};

/// Return the router for the app with all the routes and their handlers
/// configured.
///
/// Everything except the diagnostics and auth routes sits behind the auth
/// guard, which requires a valid session cookie.
pub fn build_router(state: AppState) -> Router {
    let auth_state = AuthState {
        cookie_key: state.cookie_key.clone(),
        cookie_duration: state.cookie_duration,
    };

    let protected_routes = Router::new()
        .route(endpoints::ME, get(me_endpoint))
        .route(
            endpoints::ACCOUNTS,
            get(list_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            get(get_account_endpoint)
                .put(update_account_endpoint)
                .delete(delete_account_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION_INSTALLMENTS,
            get(list_installments_endpoint),
        )
        .route(endpoints::PAY_INSTALLMENT, post(pay_installment_endpoint))
        .route(
            endpoints::SERVICES,
            get(list_services_endpoint).post(create_service_endpoint),
        )
        .route(
            endpoints::SERVICE,
            get(get_service_endpoint)
                .put(update_service_endpoint)
                .delete(delete_service_endpoint),
        )
        .route(
            endpoints::SERVICE_HISTORY,
            get(list_service_history_endpoint).post(record_service_payment_endpoint),
        )
        .route(
            endpoints::BUDGETS,
            get(list_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(endpoints::BUDGET_SUMMARY, get(budget_summary_endpoint))
        .route(
            endpoints::BUDGET,
            get(get_budget_endpoint)
                .put(update_budget_endpoint)
                .delete(delete_budget_endpoint),
        )
        .route(
            endpoints::GOALS,
            get(list_goals_endpoint).post(create_goal_endpoint),
        )
        .route(
            endpoints::GOAL,
            get(get_goal_endpoint)
                .put(update_goal_endpoint)
                .delete(delete_goal_endpoint),
        )
        .route(endpoints::GOAL_CONTRIBUTE, post(contribute_to_goal_endpoint))
        .route(
            endpoints::INVESTMENTS,
            get(list_investments_endpoint).post(create_investment_endpoint),
        )
        .route(
            endpoints::INVESTMENT,
            get(get_investment_endpoint)
                .put(update_investment_endpoint)
                .delete(delete_investment_endpoint),
        )
        .route(endpoints::DASHBOARD, get(dashboard_endpoint))
        .route(endpoints::CALENDAR, get(calendar_endpoint))
        .route_layer(middleware::from_fn_with_state(auth_state, auth_guard));

    Router::new()
        .merge(protected_routes)
        .route(endpoints::ROOT, get(root_endpoint))
        .route(endpoints::HEALTH, get(health_endpoint))
        .route(endpoints::REGISTER, post(register_endpoint))
        .route(endpoints::LOG_IN, post(log_in_endpoint))
        .route(endpoints::LOG_OUT, post(log_out_endpoint))
        .route(endpoints::OAUTH_START, get(oauth_start_endpoint))
        .route(endpoints::OAUTH_CALLBACK, get(oauth_callback_endpoint))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    Error::NotFound
}

#[cfg(test)]
mod router_tests {
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{AppState, PaginationConfig, auth::COOKIE_TOKEN, build_router, endpoints};

    fn get_test_server() -> TestServer {
        let conn = Connection::open_in_memory().unwrap();
        let state =
            AppState::new(conn, "wuzzapokalypse", PaginationConfig::default(), None).unwrap();

        TestServer::new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn root_and_health_need_no_auth() {
        let server = get_test_server();

        server.get(endpoints::ROOT).await.assert_status_ok();
        server.get(endpoints::HEALTH).await.assert_status_ok();
    }

    #[tokio::test]
    async fn protected_route_without_cookie_is_401() {
        let server = get_test_server();

        let response = server.get(endpoints::ACCOUNTS).await;

        response.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let server = get_test_server();

        let response = server.get("/api/nope").await;

        response.assert_status_not_found();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn register_then_use_protected_route() {
        let server = get_test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({"email": "foo@bar.baz", "password": "iamtestingwhethericanregister"}))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let token_cookie = response.cookie(COOKIE_TOKEN);

        let response = server
            .post(endpoints::ACCOUNTS)
            .add_cookie(token_cookie)
            .json(&json!({"name": "Everyday", "kind": "checking", "balance": 100.0}))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], "Everyday");
    }

    #[tokio::test]
    async fn budget_summary_route_is_not_shadowed() {
        let server = get_test_server();

        let response = server
            .post(endpoints::REGISTER)
            .json(&json!({"email": "foo@bar.baz", "password": "iamtestingwhethericanregister"}))
            .await;
        let token_cookie = response.cookie(COOKIE_TOKEN);

        let response = server
            .get(&format!("{}?month=2025-01", endpoints::BUDGET_SUMMARY))
            .add_cookie(token_cookie)
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["month"], "2025-01");
    }
}

//! The API endpoint URIs.

/// The root route, which reports the service name and version.
pub const ROOT: &str = "/";
/// The route that checks database connectivity.
pub const HEALTH: &str = "/api/health";

/// The route for registering a new user with an email and password.
pub const REGISTER: &str = "/api/auth/register";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/auth/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/auth/log_out";
/// The route that returns the logged-in user's profile.
pub const ME: &str = "/api/auth/me";
/// The route that starts the OAuth redirect dance.
pub const OAUTH_START: &str = "/api/auth/oauth";
/// The route the OAuth provider redirects back to.
pub const OAUTH_CALLBACK: &str = "/api/auth/oauth/callback";

/// The route to list and create accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to access a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to list the installments of a credit transaction.
pub const TRANSACTION_INSTALLMENTS: &str = "/api/transactions/{transaction_id}/installments";
/// The route to mark an installment as paid.
pub const PAY_INSTALLMENT: &str = "/api/installments/{installment_id}/pay";

/// The route to list and create recurring services.
pub const SERVICES: &str = "/api/services";
/// The route to access a single service.
pub const SERVICE: &str = "/api/services/{service_id}";
/// The route to list and record payment history for a service.
pub const SERVICE_HISTORY: &str = "/api/services/{service_id}/history";

/// The route to list and create budgets.
pub const BUDGETS: &str = "/api/budgets";
/// The route to access a single budget.
pub const BUDGET: &str = "/api/budgets/{budget_id}";
/// The route that aggregates spending against budgets for a month.
pub const BUDGET_SUMMARY: &str = "/api/budgets/summary";

/// The route to list and create savings goals.
pub const GOALS: &str = "/api/goals";
/// The route to access a single savings goal.
pub const GOAL: &str = "/api/goals/{goal_id}";
/// The route to add a contribution to a savings goal.
pub const GOAL_CONTRIBUTE: &str = "/api/goals/{goal_id}/contribute";

/// The route to list and create investments.
pub const INVESTMENTS: &str = "/api/investments";
/// The route to access a single investment.
pub const INVESTMENT: &str = "/api/investments/{investment_id}";

/// The route for the monthly dashboard summary.
pub const DASHBOARD: &str = "/api/dashboard";
/// The route for the month-view calendar.
pub const CALENDAR: &str = "/api/calendar/{year}/{month}";

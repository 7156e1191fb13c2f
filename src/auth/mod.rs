//! Authentication for the JSON API: password hashing and validation,
//! encrypted session cookies, the auth middleware, and the OAuth redirect
//! dance.

mod cookie;
mod log_in;
mod log_out;
mod me;
mod middleware;
mod oauth;
mod password;
mod register;
mod token;

pub(crate) use cookie::{COOKIE_STATE, COOKIE_TOKEN, invalidate_auth_cookie, set_auth_cookie};
pub(crate) use log_in::log_in_endpoint;
pub(crate) use log_out::log_out_endpoint;
pub(crate) use me::me_endpoint;
pub(crate) use middleware::{AuthState, auth_guard};
pub(crate) use oauth::{oauth_callback_endpoint, oauth_start_endpoint};
pub(crate) use register::register_endpoint;
pub(crate) use token::Token;

pub use cookie::DEFAULT_COOKIE_DURATION;
pub use password::{PasswordHash, ValidatedPassword};

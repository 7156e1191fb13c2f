//! Accounts hold the user's money: bank accounts, credit cards, and cash
//! wallets. This module defines the account model and its CRUD endpoints.

mod core;
mod endpoints;

pub(crate) use core::{Account, AccountKind, create_account_table, get_total_account_balance};
pub(crate) use endpoints::{
    create_account_endpoint, delete_account_endpoint, get_account_endpoint,
    list_accounts_endpoint, update_account_endpoint,
};

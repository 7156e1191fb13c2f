//! Transactions record money moving in and out: income, expenses, and
//! credit purchases. Credit transactions carry an installment plan that
//! splits the financed total across monthly repayments.

mod endpoints;
mod installment;
mod models;
mod query;

pub(crate) use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    list_transactions_endpoint, update_transaction_endpoint,
};
pub(crate) use installment::{
    Installment, create_installment_table, list_installments_endpoint, pay_installment_endpoint,
};
pub(crate) use models::{Transaction, TransactionKind, create_transaction_table};
pub(crate) use query::{
    count_unpaid_installments_due, expense_totals_by_category, get_installments_due_in_range,
    get_transactions_in_range, sum_amount_by_kind,
};

//! Recurring services are bills that come due every month, e.g. utilities
//! and subscriptions. Each service keeps a per-month payment history.

mod core;
mod endpoints;

pub(crate) use core::{
    Service, create_service_history_table, create_service_table, get_active_services,
};
pub(crate) use endpoints::{
    create_service_endpoint, delete_service_endpoint, get_service_endpoint,
    list_service_history_endpoint, list_services_endpoint, record_service_payment_endpoint,
    update_service_endpoint,
};

// handlers/mod.rs - one module per resource
//
// Public:        health
// Bearer only:   auth
// Session:       budgets, transactions, dashboard, devices, activity
// Service role:  cleanup
//
// Gates are attached in app::router, so handlers read the caller from request
// extensions and never inspect headers themselves.

pub mod activity;
pub mod auth;
pub mod budgets;
pub mod cleanup;
pub mod dashboard;
pub mod devices;
pub mod health;
pub mod transactions;

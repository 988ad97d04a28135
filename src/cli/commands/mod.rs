pub mod auth;
pub mod dashboard;
pub mod devices;
pub mod health;
pub mod transactions;

pub mod app;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod session;
pub mod token;

pub use app::{router, AppState};

pub mod access;
pub mod aggregate;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;
pub mod user_models;
pub mod user_storage;
pub mod validation;

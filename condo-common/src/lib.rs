//! # Condo Ledger Common Library
//!
//! Shared code for the condo-ledger binaries:
//! - Database initialization, migrations and entity repositories
//! - Dynamic SQL query builder
//! - Budget and balance reports
//! - Configuration loading
//! - Password hashing and session tokens
//! - Money and date helpers

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod money;
pub mod reports;
pub mod serde_utils;
pub mod time;

pub use error::{Error, Result};

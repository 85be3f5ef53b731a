//! HTTP API handlers for condo-server

pub mod auth;
pub mod budget;
pub mod buildinfo;
pub mod expenses;
pub mod health;
pub mod people;
pub mod reports;
pub mod revenue;
pub mod ui;
pub mod units;

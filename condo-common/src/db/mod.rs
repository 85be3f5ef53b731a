//! Database schema, migrations and repositories

pub mod budget;
pub mod expenses;
pub mod init;
pub mod migrations;
pub mod page;
pub mod people;
pub mod query_builder;
pub mod record;
pub mod revenue;
pub mod units;
pub mod users;

pub use init::{init_database, init_memory_database};
pub use migrations::run_migrations;
pub use page::{Page, PageRequest};

use std::env;

use sqlbind::{Connection, Driver};

pub fn setup_if_needed() {
    let _ = dotenvy::dotenv();
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The database to test against: `DATABASE_URL`, or a fresh in-memory SQLite database.
// Ensure [dotenvy] and [env_logger] have been setup
pub fn database_url() -> String {
    setup_if_needed();
    env::var("DATABASE_URL").unwrap_or_else(|_| String::from("sqlite::memory:"))
}

// Make a new connection
pub fn connect<D: Driver>(driver: &D) -> anyhow::Result<Box<dyn Connection>> {
    Ok(driver.connect(&database_url())?)
}

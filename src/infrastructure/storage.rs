use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

const BASE_SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Creates the database file if needed and applies the base schema. Every
/// statement in the schema is idempotent, so bootstrap runs this on each start.
pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(BASE_SCHEMA)?;
    Ok(())
}

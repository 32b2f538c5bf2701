//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and drives the
//! troupe-core engine through the `HistoryStore` load-modify-save loop.

pub mod chat;
pub mod process;
pub mod validate;

use troupe_core::{Database, SqliteHistoryStore, TeamDefinition};

/// Open the conversation store at the given SQLite database path.
pub fn init_store(db_path: &str) -> Result<SqliteHistoryStore, String> {
    let db = Database::open(db_path)
        .map_err(|e| format!("Failed to open database '{}': {}", db_path, e))?;
    Ok(SqliteHistoryStore::new(db))
}

/// Load and validate a team definition from a YAML file.
pub fn load_definition(team_path: &str) -> Result<TeamDefinition, String> {
    TeamDefinition::from_file(team_path).map_err(|e| e.to_string())
}
